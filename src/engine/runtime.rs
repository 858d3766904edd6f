//! Bounded worker pool for oracle consultations.
//!
//! Reconciliation is deterministic even though oracle calls run on worker
//! threads: each phase submits a full batch of questions before joining any
//! answer, and joins the handles in submission order. Worker scheduling can
//! reorder the consultations themselves but never the order in which their
//! answers are consumed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::oracle::{
    ClaimJudgment, ClaimQuestion, FrameJudgment, FrameQuestion, JudgmentOracle, OracleError,
    ResolutionJudgment, ResolutionQuestion, SupportJudgment, SupportQuestion, TermJudgment,
    TermQuestion,
};

enum OracleJob {
    Term {
        question: TermQuestion,
        reply: Sender<Result<TermJudgment, OracleError>>,
    },
    Claims {
        question: ClaimQuestion,
        reply: Sender<Result<ClaimJudgment, OracleError>>,
    },
    Resolution {
        question: ResolutionQuestion,
        reply: Sender<Result<ResolutionJudgment, OracleError>>,
    },
    Frames {
        question: FrameQuestion,
        reply: Sender<Result<FrameJudgment, OracleError>>,
    },
    Support {
        question: SupportQuestion,
        reply: Sender<Result<SupportJudgment, OracleError>>,
    },
}

impl OracleJob {
    fn run(self, oracle: &dyn JudgmentOracle) {
        match self {
            Self::Term { question, reply } => {
                let _ = reply.send(oracle.classify_term(&question));
            }
            Self::Claims { question, reply } => {
                let _ = reply.send(oracle.classify_claims(&question));
            }
            Self::Resolution { question, reply } => {
                let _ = reply.send(oracle.attempt_resolution(&question));
            }
            Self::Frames { question, reply } => {
                let _ = reply.send(oracle.compare_frames(&question));
            }
            Self::Support { question, reply } => {
                let _ = reply.send(oracle.assess_support(&question));
            }
        }
    }
}

/// Handle for one in-flight consultation.
///
/// Joining consumes the handle; every submitted question is joined exactly
/// once, in the order it was submitted.
pub(crate) struct OracleHandle<T> {
    rx: Receiver<Result<T, OracleError>>,
}

impl<T> OracleHandle<T> {
    /// Waits for the oracle's answer, up to `timeout`.
    pub(crate) fn join_timeout(self, timeout: Duration) -> Result<T, OracleError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => OracleError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => {
                OracleError::unavailable("oracle worker disconnected before replying")
            }
        })?
    }
}

/// A bounded pool of threads servicing oracle consultations.
///
/// Dropping the pool closes the queue; workers drain what was already
/// submitted and then exit, and the drop joins them.
pub(crate) struct OraclePool {
    tx: Option<Sender<OracleJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl OraclePool {
    /// Starts `workers` threads consulting `oracle`, with a queue bound of
    /// `queue_capacity`.
    pub(crate) fn start(
        oracle: Arc<dyn JudgmentOracle>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<OracleJob>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<OracleJob> = rx.clone();
            let oracle = Arc::clone(&oracle);
            let thread_name = format!("concord-oracle-{idx}");
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job.run(oracle.as_ref());
                    }
                })
                .expect("failed to spawn concord oracle worker");
            handles.push(handle);
        }

        Self {
            tx: Some(tx),
            workers: handles,
        }
    }

    /// Submits a job, blocking if the queue is full.
    ///
    /// A full queue must apply backpressure, not degrade the answer: whether a
    /// question reaches the oracle cannot depend on queue timing. If the
    /// channel is closed the job is dropped and the handle's receiver reports
    /// the disconnect at join time.
    fn submit(&self, job: OracleJob) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
    }

    pub(crate) fn submit_term(&self, question: TermQuestion) -> OracleHandle<TermJudgment> {
        let (tx, rx) = bounded(1);
        self.submit(OracleJob::Term {
            question,
            reply: tx,
        });
        OracleHandle { rx }
    }

    pub(crate) fn submit_claims(&self, question: ClaimQuestion) -> OracleHandle<ClaimJudgment> {
        let (tx, rx) = bounded(1);
        self.submit(OracleJob::Claims {
            question,
            reply: tx,
        });
        OracleHandle { rx }
    }

    pub(crate) fn submit_resolution(
        &self,
        question: ResolutionQuestion,
    ) -> OracleHandle<ResolutionJudgment> {
        let (tx, rx) = bounded(1);
        self.submit(OracleJob::Resolution {
            question,
            reply: tx,
        });
        OracleHandle { rx }
    }

    pub(crate) fn submit_frames(&self, question: FrameQuestion) -> OracleHandle<FrameJudgment> {
        let (tx, rx) = bounded(1);
        self.submit(OracleJob::Frames {
            question,
            reply: tx,
        });
        OracleHandle { rx }
    }

    pub(crate) fn submit_support(&self, question: SupportQuestion) -> OracleHandle<SupportJudgment> {
        let (tx, rx) = bounded(1);
        self.submit(OracleJob::Support {
            question,
            reply: tx,
        });
        OracleHandle { rx }
    }
}

impl Drop for OraclePool {
    fn drop(&mut self) {
        // Close the channel: workers drain queued jobs then exit.
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
