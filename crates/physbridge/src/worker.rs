//! # Backend Worker
//!
//! Runs a [`Backend`] on a dedicated thread. The only traffic between the
//! threads is ownership of byte buffers.
//!
//! ```text
//! caller thread                       worker thread
//! ─────────────                       ─────────────
//!                  ←── Startup ───    StartupConstants::collect()
//! submit(inbound) ─── Step ──────→    backend.step(inbound, dt)
//! receive()       ←── Stepped ───     outbound bytes + aux + views
//! drop / shutdown ─── Shutdown ──→    backend.shutdown()
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use physbridge_backend::{Backend, BackendConfig, BackendError, Inbound, PhysicsEngine, StepOutput, TickOutcome};
use physbridge_protocol::StartupConstants;

use crate::error::{ClientError, ClientResult};

/// Requests queued for the worker. Each one is answered in order.
const REQUEST_CAPACITY: usize = 64;

/// Request sent to the worker thread.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Run one tick.
    Step {
        /// Commands for this tick.
        inbound: Option<Inbound>,
        /// Elapsed time, in seconds.
        dt: f32,
    },
    /// Destroy every object.
    Clear,
    /// Stop the worker.
    Shutdown,
}

/// Message sent back by the worker thread.
#[derive(Debug)]
pub enum WorkerMessage {
    /// First message, sent once.
    Startup(StartupConstants),
    /// A tick ran.
    Stepped(StepOutput),
    /// No commands buffer has been submitted yet.
    Idle,
    /// The backend is halted. Nothing ran.
    Halted,
    /// The tick failed and halted the backend.
    Failed(BackendError),
    /// The world was cleared.
    Cleared,
}

/// Worker state readable from any thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStatus {
    /// Requests answered.
    pub answered: u64,
    /// Engine steps run.
    pub steps: u64,
    /// Tracked bodies after the last tick.
    pub bodies: usize,
    /// The backend is halted.
    pub halted: bool,
}

/// Handle to a backend running on its own thread.
#[derive(Debug)]
pub struct BackendWorker {
    requests: Sender<WorkerRequest>,
    messages: Receiver<WorkerMessage>,
    status: Arc<Mutex<WorkerStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl BackendWorker {
    /// Creates the backend and starts its thread.
    ///
    /// # Errors
    ///
    /// An invalid configuration, or a thread that could not be spawned.
    pub fn spawn<E>(engine: E, config: BackendConfig) -> ClientResult<Self>
    where
        E: PhysicsEngine + Send + 'static,
    {
        let backend = Backend::new(engine, config)?;
        let (request_tx, request_rx) = bounded(REQUEST_CAPACITY);
        let (message_tx, message_rx) = bounded(REQUEST_CAPACITY + 1);
        let status = Arc::new(Mutex::new(WorkerStatus::default()));

        let shared = Arc::clone(&status);
        let handle = std::thread::Builder::new()
            .name("physbridge-backend".into())
            .spawn(move || run(backend, &request_rx, &message_tx, &shared))?;

        tracing::info!("Backend worker started");
        Ok(Self {
            requests: request_tx,
            messages: message_rx,
            status,
            handle: Some(handle),
        })
    }

    /// Queues a tick.
    ///
    /// # Errors
    ///
    /// [`ClientError::Disconnected`] if the worker is gone.
    pub fn submit(&self, inbound: Option<Inbound>, dt: f32) -> ClientResult<()> {
        self.send(WorkerRequest::Step { inbound, dt })
    }

    /// Queues a clear of the whole world.
    ///
    /// # Errors
    ///
    /// [`ClientError::Disconnected`] if the worker is gone.
    pub fn clear(&self) -> ClientResult<()> {
        self.send(WorkerRequest::Clear)
    }

    /// Waits for the next message.
    ///
    /// # Errors
    ///
    /// [`ClientError::Disconnected`] if the worker is gone.
    pub fn receive(&self) -> ClientResult<WorkerMessage> {
        self.messages.recv().map_err(|_| ClientError::Disconnected)
    }

    /// Returns the next message if one is ready.
    ///
    /// # Errors
    ///
    /// [`ClientError::Disconnected`] if the worker is gone.
    pub fn try_receive(&self) -> ClientResult<Option<WorkerMessage>> {
        match self.messages.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ClientError::Disconnected),
        }
    }

    /// Runs one tick and waits for its output.
    ///
    /// Stray messages ahead of the answer (the startup message) are
    /// skipped.
    ///
    /// # Errors
    ///
    /// [`ClientError::Backend`] for the failure that halted the backend,
    /// [`ClientError::Disconnected`] if the worker is gone.
    pub fn step(&self, inbound: Option<Inbound>, dt: f32) -> ClientResult<Option<StepOutput>> {
        self.submit(inbound, dt)?;
        loop {
            match self.receive()? {
                WorkerMessage::Stepped(output) => return Ok(Some(output)),
                WorkerMessage::Idle | WorkerMessage::Halted => return Ok(None),
                WorkerMessage::Failed(error) => return Err(error.into()),
                WorkerMessage::Startup(_) | WorkerMessage::Cleared => {}
            }
        }
    }

    /// Snapshot of the worker state.
    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        *self.status.lock()
    }

    /// Stops the worker and waits for its thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, request: WorkerRequest) -> ClientResult<()> {
        self.requests.send(request).map_err(|_| ClientError::Disconnected)
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // The thread may already be gone
        let _ = self.requests.send(WorkerRequest::Shutdown);
        while self.messages.try_recv().is_ok() {}
        if handle.join().is_err() {
            tracing::error!("Backend worker panicked");
        }
    }
}

impl Drop for BackendWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker thread body.
fn run<E: PhysicsEngine>(
    mut backend: Backend<E>,
    requests: &Receiver<WorkerRequest>,
    messages: &Sender<WorkerMessage>,
    status: &Mutex<WorkerStatus>,
) {
    if messages.send(WorkerMessage::Startup(StartupConstants::collect())).is_err() {
        return;
    }

    while let Ok(request) = requests.recv() {
        let reply = match request {
            WorkerRequest::Step { inbound, dt } => match backend.step(inbound, dt) {
                Ok(TickOutcome::Ran(output)) => WorkerMessage::Stepped(output),
                Ok(TickOutcome::Idle) => WorkerMessage::Idle,
                Ok(TickOutcome::Halted) => WorkerMessage::Halted,
                Err(error) => WorkerMessage::Failed(error),
            },
            WorkerRequest::Clear => {
                backend.clear();
                WorkerMessage::Cleared
            }
            WorkerRequest::Shutdown => break,
        };

        {
            let mut status = status.lock();
            status.answered += 1;
            status.steps = backend.step_count();
            status.bodies = backend.world().tracker.len();
            status.halted = backend.is_halted();
        }

        if messages.send(reply).is_err() {
            break;
        }
    }

    drop(backend.shutdown());
    tracing::info!("Backend worker stopped");
}
