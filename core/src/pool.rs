//! A fixed-size pool of async workers draining one shared job queue.
//!
//! The pool knows nothing about scanning. A feeder task pushes jobs into a
//! bounded queue, `size` workers pull from it, and every result travels back
//! over a channel to the caller, which folds them one at a time in completion
//! order. Because only the caller touches its accumulator, no lock is needed
//! around it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Something the pool can run.
pub trait Job: Send + 'static {
    type Output: Send + 'static;

    /// Output reported in place of a result when executing the job panicked.
    ///
    /// Computed before the job runs, so it should be cheap.
    fn failed(&self) -> Self::Output;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Jobs a worker started. Jobs dropped from the queue by cancellation
    /// are not counted.
    pub submitted: usize,
    /// Outputs delivered to the caller. Always equal to `submitted`.
    pub completed: usize,
    /// True when cancellation left some jobs unstarted.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    size: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// A pool with at most `size` jobs in flight. A size of zero is bumped to one.
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `work` once for every job and passes each output to `on_output`
    /// as soon as it is ready.
    ///
    /// Returns after every started job has produced exactly one output.
    /// After cancellation no new job is started: jobs still waiting in the
    /// queue are dropped unrun, jobs already running finish and are delivered.
    pub async fn run_all<I, J, F, Fut, C>(&self, jobs: I, work: F, mut on_output: C) -> PoolSummary
    where
        I: IntoIterator<Item = J>,
        I::IntoIter: Send + 'static,
        J: Job,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = J::Output> + Send + 'static,
        C: FnMut(J::Output),
    {
        let (job_tx, job_rx) = mpsc::channel::<J>(self.size);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<J::Output>();
        let work = Arc::new(work);

        let feeder = tokio::spawn(feed(jobs.into_iter(), job_tx, self.cancel.clone()));

        let mut workers: JoinSet<WorkerTally> = JoinSet::new();
        for _ in 0..self.size {
            workers.spawn(worker_loop(
                job_rx.clone(),
                out_tx.clone(),
                work.clone(),
                self.cancel.clone(),
            ));
        }
        drop(out_tx);

        let mut completed: usize = 0;
        while let Some(output) = out_rx.recv().await {
            completed += 1;
            on_output(output);
        }

        let mut tally = WorkerTally::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker) => {
                    tally.started += worker.started;
                    tally.skipped += worker.skipped;
                }
                Err(e) => warn!("pool worker stopped unexpectedly: {e}"),
            }
        }

        let exhausted: bool = match feeder.await {
            Ok(exhausted) => exhausted,
            Err(e) => {
                warn!("job feeder stopped unexpectedly: {e}");
                false
            }
        };

        debug!(
            started = tally.started,
            skipped = tally.skipped,
            completed,
            exhausted,
            "worker pool drained"
        );

        PoolSummary {
            submitted: tally.started,
            completed,
            cancelled: !exhausted || tally.skipped > 0,
        }
    }
}

/// Pushes jobs into the queue until the source is exhausted or the token
/// fires. Returns whether the source ran dry.
async fn feed<It, J>(jobs: It, tx: mpsc::Sender<J>, cancel: CancellationToken) -> bool
where
    It: Iterator<Item = J>,
{
    for job in jobs {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            sent = tx.send(job) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }

    true
}

/// What one worker did before its queue closed.
#[derive(Debug, Default)]
struct WorkerTally {
    started: usize,
    skipped: usize,
}

async fn worker_loop<J, F, Fut>(
    jobs: Arc<Mutex<mpsc::Receiver<J>>>,
    outputs: mpsc::UnboundedSender<J::Output>,
    work: Arc<F>,
    cancel: CancellationToken,
) -> WorkerTally
where
    J: Job,
    F: Fn(J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = J::Output> + Send + 'static,
{
    let mut tally = WorkerTally::default();

    loop {
        let next: Option<J> = jobs.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        // queued before the token fired, but not started
        if cancel.is_cancelled() {
            tally.skipped += 1;
            continue;
        }
        tally.started += 1;

        let fallback: J::Output = job.failed();
        let output = match AssertUnwindSafe(async { (*work)(job).await })
            .catch_unwind()
            .await
        {
            Ok(output) => output,
            Err(_) => {
                warn!("job panicked; reporting it as failed");
                fallback
            }
        };

        if outputs.send(output).is_err() {
            break;
        }
    }

    tally
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
