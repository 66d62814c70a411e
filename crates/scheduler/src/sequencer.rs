//! Sequenced render worker.
//!
//! A single worker thread executes render requests one at a time in the
//! order they were submitted. Requests are never cancelled or coalesced: a
//! new request queues behind whatever is in flight, and every submitted
//! request eventually runs. Callers block on the returned [`RenderTicket`]
//! when they need the result.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    mpsc, Arc,
};
use std::thread::{self, JoinHandle};

/// Monotonic identifier assigned to each submitted request.
pub type JobId = u64;

/// Errors produced by the render sequencer.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("render worker has stopped")]
    WorkerStopped,
}

struct Job<Req, Out> {
    id: JobId,
    request: Req,
    reply: mpsc::Sender<Out>,
}

/// Counters shared between the sequencer and its worker.
#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    in_flight: AtomicUsize,
}

/// Point-in-time view of the sequencer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerStats {
    pub submitted: u64,
    pub completed: u64,
    /// Requests currently executing (never more than one).
    pub in_flight: usize,
}

impl SequencerStats {
    /// Requests submitted but not yet finished, including the one in flight.
    pub fn pending(&self) -> u64 {
        self.submitted - self.completed
    }
}

/// Handle to the eventual result of one render request.
pub struct RenderTicket<Out> {
    id: JobId,
    receiver: mpsc::Receiver<Out>,
}

impl<Out> RenderTicket<Out> {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Block until the request has been executed.
    pub fn wait(self) -> Result<Out, SequencerError> {
        self.receiver.recv().map_err(|_| SequencerError::WorkerStopped)
    }

    /// Return the result if the request already finished.
    pub fn try_take(&self) -> Result<Option<Out>, SequencerError> {
        match self.receiver.try_recv() {
            Ok(out) => Ok(Some(out)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(SequencerError::WorkerStopped),
        }
    }
}

/// FIFO, one-at-a-time executor for render requests.
///
/// # Example
///
/// ```
/// use pdf_editor_scheduler::RenderSequencer;
///
/// let sequencer = RenderSequencer::spawn("doubler", |value: u32| value * 2).unwrap();
/// let first = sequencer.submit(1).unwrap();
/// let second = sequencer.submit(2).unwrap();
///
/// assert_eq!(first.wait().unwrap(), 2);
/// assert_eq!(second.wait().unwrap(), 4);
/// ```
pub struct RenderSequencer<Req, Out> {
    sender: Option<mpsc::Sender<Job<Req, Out>>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
    next_id: AtomicU64,
}

impl<Req, Out> RenderSequencer<Req, Out>
where
    Req: Send + 'static,
    Out: Send + 'static,
{
    /// Start the worker thread. `executor` runs once per request, in order.
    pub fn spawn<F>(name: &str, executor: F) -> Result<Self, SequencerError>
    where
        F: FnMut(Req) -> Out + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Job<Req, Out>>();
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);

        let worker = thread::Builder::new()
            .name(format!("render-sequencer-{name}"))
            .spawn(move || Self::run(receiver, executor, worker_counters))
            .map_err(SequencerError::Spawn)?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            counters,
            next_id: AtomicU64::new(1),
        })
    }

    /// Queue a request behind any in-flight or pending ones.
    pub fn submit(&self, request: Req) -> Result<RenderTicket<Out>, SequencerError> {
        let sender = self.sender.as_ref().ok_or(SequencerError::WorkerStopped)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = mpsc::channel();

        self.counters.submitted.fetch_add(1, Ordering::AcqRel);
        if sender.send(Job { id, request, reply }).is_err() {
            self.counters.submitted.fetch_sub(1, Ordering::AcqRel);
            return Err(SequencerError::WorkerStopped);
        }

        log::debug!("queued render job {id}");
        Ok(RenderTicket { id, receiver })
    }

    pub fn stats(&self) -> SequencerStats {
        SequencerStats {
            submitted: self.counters.submitted.load(Ordering::Acquire),
            completed: self.counters.completed.load(Ordering::Acquire),
            in_flight: self.counters.in_flight.load(Ordering::Acquire),
        }
    }

    /// Stop accepting requests, let the queue drain, and join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn run<F>(receiver: mpsc::Receiver<Job<Req, Out>>, mut executor: F, counters: Arc<Counters>)
    where
        F: FnMut(Req) -> Out,
    {
        for job in receiver {
            counters.in_flight.fetch_add(1, Ordering::AcqRel);
            let out = executor(job.request);
            counters.in_flight.fetch_sub(1, Ordering::AcqRel);
            counters.completed.fetch_add(1, Ordering::AcqRel);

            if job.reply.send(out).is_err() {
                log::debug!("render job {} finished after its ticket was dropped", job.id);
            }
        }
    }
}

impl<Req, Out> RenderSequencer<Req, Out> {
    fn stop(&mut self) {
        // Closing the channel ends the worker loop once the queue is empty.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("render worker panicked");
            }
        }
    }
}

impl<Req, Out> Drop for RenderSequencer<Req, Out> {
    fn drop(&mut self) {
        self.stop();
    }
}
