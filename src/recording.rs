use crate::error::Result;
use crate::sensors::{LocationFix, Sample};
use crate::service::DistanceService;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Gravity vector in m/s²
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub horizontal_accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_accuracy: Option<f64>,
}

/// One timestamped entry of a recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Epoch seconds
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<GravityReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationReading>,
}

impl Reading {
    pub fn sample(&self) -> Option<Sample> {
        self.gravity
            .map(|g| Sample::new(g.x, g.y, g.z, self.timestamp))
    }

    pub fn fix(&self) -> Option<LocationFix> {
        self.location.as_ref().map(|l| LocationFix {
            latitude: l.latitude,
            longitude: l.longitude,
            altitude: l.altitude,
            horizontal_accuracy: l.horizontal_accuracy,
            vertical_accuracy: l.vertical_accuracy,
            timestamp: self.timestamp,
        })
    }
}

/// Recorded sensor session, replayable through the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub readings: Vec<Reading>,
}

impl SessionLog {
    /// Load a `.json` or gzip compressed `.json.gz` recording.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if is_gzip(path) {
            Self::from_reader(GzDecoder::new(file))
        } else {
            Self::from_reader(file)
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(reader))?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?;
        } else {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.readings.iter().filter(|r| r.gravity.is_some()).count()
    }

    pub fn fix_count(&self) -> usize {
        self.readings.iter().filter(|r| r.location.is_some()).count()
    }

    /// First and last timestamp of the recording.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((self.readings.first()?.timestamp, self.readings.last()?.timestamp))
    }

    /// Push every reading into `service` in recorded order.
    ///
    /// Gravity is pushed before location when a reading carries both.
    pub fn replay(&self, service: &DistanceService) -> Result<()> {
        for reading in &self.readings {
            if let Some(sample) = reading.sample() {
                service.push_sample(sample)?;
            }
            if let Some(fix) = reading.fix() {
                service.push_location(fix)?;
            }
        }
        Ok(())
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"{
        "readings": [
            {"timestamp": 1.0, "gravity": {"x": 0.1, "y": 0.2, "z": 9.7}},
            {"timestamp": 1.1, "location": {"latitude": 48.1, "longitude": 11.5,
                "altitude": 520.0, "horizontalAccuracy": 4.5}},
            {"timestamp": 1.2, "gravity": {"x": 0.0, "y": 0.0, "z": 9.8},
                "location": {"latitude": 48.1, "longitude": 11.5, "altitude": 520.0,
                "horizontalAccuracy": 4.5, "verticalAccuracy": 3.0}}
        ]
    }"#;

    #[test]
    fn test_parse_readings() {
        let log = SessionLog::from_reader(LOG.as_bytes()).unwrap();
        assert_eq!(log.readings.len(), 3);
        assert_eq!(log.sample_count(), 2);
        assert_eq!(log.fix_count(), 2);
        assert_eq!(log.time_span(), Some((1.0, 1.2)));

        let sample = log.readings[0].sample().unwrap();
        assert_eq!(sample, Sample::new(0.1, 0.2, 9.7, 1.0));
        assert!(log.readings[0].fix().is_none());

        let fix = log.readings[2].fix().unwrap();
        assert_eq!(fix.timestamp, 1.2);
        assert_eq!(fix.vertical_accuracy, Some(3.0));
    }

    #[test]
    fn test_gzip_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk.json.gz");
        let log = SessionLog::from_reader(LOG.as_bytes()).unwrap();

        log.save(&path).unwrap();
        assert_eq!(SessionLog::load(&path).unwrap(), log);

        // Not readable as plain JSON
        assert!(SessionLog::from_reader(File::open(&path).unwrap()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(SessionLog::load(Path::new("/nonexistent/walk.json")).is_err());
    }
}
