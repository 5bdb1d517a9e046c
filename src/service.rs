//! Threaded front end of the [`DistanceEngine`].
//!
//! Motion samples, location fixes and control operations all travel through one queue and
//! are applied by a single worker thread, so the two sensor streams never touch the engine
//! concurrently. Control operations wait for the worker's reply; sensor input does not.

use crate::config::EngineConfig;
use crate::distance::{CalibrationState, DistanceEngine};
use crate::error::{Result, StepDistError};
use crate::events::{DistanceUpdate, EngineEvent};
use crate::sensors::{LocationFix, Sample};
use crate::storage::KeyValueStore;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Engine state as seen by the worker after all earlier messages were applied
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub localizing: bool,
    pub tracking: bool,
    pub distance: DistanceUpdate,
    pub steps_per_minute: usize,
    pub calibration: CalibrationState,
}

type Reply<T> = Sender<Result<T>>;

enum Message {
    Sample(Sample),
    Location(LocationFix),
    StartLocalization(EngineConfig, Reply<()>),
    StopLocalization(Reply<()>),
    StartMeasuring(bool, Reply<()>),
    StopMeasuring(Reply<()>),
    SetBodyHeight(f64, Reply<()>),
    ResetCalibration(Reply<()>),
    Snapshot(Reply<EngineSnapshot>),
    Shutdown,
}

/// Handle to the distance worker thread
pub struct DistanceService {
    messages: Sender<Message>,
    events: Receiver<EngineEvent>,
    tracking: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DistanceService {
    /// Spawn the worker; calibration is loaded from `store` right away.
    pub fn spawn(store: Box<dyn KeyValueStore>) -> Result<Self> {
        let (messages, inbox) = unbounded();
        let (event_tx, events) = unbounded();
        let tracking = Arc::new(AtomicBool::new(false));

        let worker_tracking = Arc::clone(&tracking);
        let handle = thread::Builder::new()
            .name("distance".into())
            .spawn(move || {
                let engine = DistanceEngine::new(store, event_tx);
                run_worker(engine, inbox, worker_tracking);
            })
            .map_err(|e| StepDistError::Internal(format!("failed to spawn worker: {e}")))?;

        Ok(Self {
            messages,
            events,
            tracking,
            handle: Some(handle),
        })
    }

    /// Distance and status events, in the order the engine produced them.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Acquire)
    }

    pub fn start_localization(&self, config: EngineConfig) -> Result<()> {
        self.request(|reply| Message::StartLocalization(config, reply))
    }

    pub fn stop_localization(&self) -> Result<()> {
        self.tracking.store(false, Ordering::Release);
        self.request(Message::StopLocalization)
    }

    pub fn start_measuring_distance(&self, enable_gnss_calibration: bool) -> Result<()> {
        self.request(|reply| Message::StartMeasuring(enable_gnss_calibration, reply))
    }

    /// Stop counting; samples pushed after this call are dropped immediately.
    pub fn stop_measuring_distance(&self) -> Result<()> {
        self.tracking.store(false, Ordering::Release);
        self.request(Message::StopMeasuring)
    }

    pub fn set_body_height(&self, body_height: f64) -> Result<()> {
        self.request(|reply| Message::SetBodyHeight(body_height, reply))
    }

    pub fn reset_calibration(&self) -> Result<()> {
        self.request(Message::ResetCalibration)
    }

    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        self.request(Message::Snapshot)
    }

    /// Queue a gravity sample; ignored while no measurement is running.
    pub fn push_sample(&self, sample: Sample) -> Result<()> {
        if !self.is_tracking() {
            return Ok(());
        }
        self.send(Message::Sample(sample))
    }

    pub fn push_location(&self, fix: LocationFix) -> Result<()> {
        self.send(Message::Location(fix))
    }

    /// Apply everything queued so far, then stop the worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_worker()
    }

    fn send(&self, message: Message) -> Result<()> {
        self.messages
            .send(message)
            .map_err(|_| StepDistError::ChannelClosed)
    }

    fn request<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(Reply<T>) -> Message,
    {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(make(reply_tx))?;
        reply_rx.recv().map_err(|_| StepDistError::ChannelClosed)?
    }

    fn stop_worker(&mut self) -> Result<()> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        // The worker may already be gone after a panic
        let _ = self.messages.send(Message::Shutdown);
        handle
            .join()
            .map_err(|_| StepDistError::Internal("distance worker panicked".into()))
    }
}

impl Drop for DistanceService {
    fn drop(&mut self) {
        if let Err(e) = self.stop_worker() {
            log::error!("{}", e);
        }
    }
}

fn run_worker(mut engine: DistanceEngine, inbox: Receiver<Message>, tracking: Arc<AtomicBool>) {
    log::debug!("Distance worker started");

    for message in inbox.iter() {
        match message {
            Message::Sample(sample) => engine.process_sample(&sample),
            Message::Location(fix) => engine.process_location(&fix),
            Message::StartLocalization(config, reply) => {
                let _ = reply.send(engine.start_localization(config));
            }
            Message::StopLocalization(reply) => {
                let _ = reply.send(engine.stop_localization());
            }
            Message::StartMeasuring(enable, reply) => {
                let result = engine.start_measuring_distance(enable);
                tracking.store(engine.is_tracking(), Ordering::Release);
                let _ = reply.send(result);
            }
            Message::StopMeasuring(reply) => {
                let _ = reply.send(engine.stop_measuring_distance());
            }
            Message::SetBodyHeight(height, reply) => {
                let _ = reply.send(engine.set_body_height(height));
            }
            Message::ResetCalibration(reply) => {
                engine.reset_calibration();
                let _ = reply.send(Ok(()));
            }
            Message::Snapshot(reply) => {
                let _ = reply.send(Ok(EngineSnapshot {
                    localizing: engine.is_localizing(),
                    tracking: engine.is_tracking(),
                    distance: engine.distance_update(),
                    steps_per_minute: engine.steps_per_minute(),
                    calibration: *engine.calibration(),
                }));
            }
            Message::Shutdown => break,
        }
        tracking.fetch_and(engine.is_tracking(), Ordering::AcqRel);
    }

    log::debug!("Distance worker exiting");
}
