//! Evaluation buffer backed by a background worker.
//!
//! The worker owns its own scorer, built inside the worker: a clone of the
//! search's scorer on a thread, or a [`ProcessScorer`] talking to an external
//! process. Batches travel over a task channel and scores come back over a
//! reply channel in submission order. At most `max_in_flight` batches are
//! outstanding; submitting one more blocks until the oldest has returned.
//!
//! Dropping the buffer raises a cancellation flag and closes the task
//! channel. The worker checks the flag between batches, so it stops after
//! at most the batch it is scoring, whose result is discarded.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use tree_core::TreeNode;

use crate::buffer::{Batch, BatchIndex, EvalBuffer, ScoredLeaf};
use crate::evaluator::{Evaluator, EvaluatorError, Scorer};
use crate::node::NodeId;
use crate::process::ProcessScorer;

/// Builds the worker's scorer on the worker thread.
pub type ScorerFactory = Box<dyn FnOnce() -> Result<Box<dyn Scorer>, EvaluatorError> + Send>;

struct Reply {
    values: Result<Vec<f64>, EvaluatorError>,
    elapsed: Duration,
}

/// Buffer handing full batches to a background worker.
pub struct ParallelEvalBuffer<N> {
    buffer_size: usize,
    max_in_flight: usize,

    index: BatchIndex<N>,

    /// Batches sent to the worker, oldest first.
    in_flight: VecDeque<Batch<N>>,

    tasks: Option<Sender<Vec<String>>>,
    replies: Receiver<Reply>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,

    results: Vec<ScoredLeaf<N>>,
}

impl<N: TreeNode> ParallelEvalBuffer<N> {
    /// Start a worker thread scoring with whatever `factory` builds.
    ///
    /// # Panics
    /// Panics if `buffer_size` or `max_in_flight` is 0.
    pub fn spawn(
        buffer_size: usize,
        max_in_flight: usize,
        factory: ScorerFactory,
    ) -> Result<Self, EvaluatorError> {
        assert!(buffer_size >= 1, "buffer_size must be at least 1");
        assert!(max_in_flight >= 1, "max_in_flight_batches must be at least 1");

        let (task_tx, task_rx) = mpsc::channel::<Vec<String>>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_cancel = Arc::clone(&cancel);
        let worker = thread::Builder::new()
            .name("eval-worker".to_string())
            .spawn(move || worker_loop(factory, task_rx, reply_tx, worker_cancel))?;

        Ok(Self {
            buffer_size,
            max_in_flight,
            index: BatchIndex::new(),
            in_flight: VecDeque::new(),
            tasks: Some(task_tx),
            replies: reply_rx,
            cancel,
            worker: Some(worker),
            results: Vec::new(),
        })
    }

    /// Score on a thread with a clone of `scorer`.
    pub fn with_thread<S>(
        buffer_size: usize,
        max_in_flight: usize,
        scorer: S,
    ) -> Result<Self, EvaluatorError>
    where
        S: Scorer + 'static,
    {
        info!("Creating a thread to evaluate the leaves");
        Self::spawn(
            buffer_size,
            max_in_flight,
            Box::new(move || Ok(Box::new(scorer) as Box<dyn Scorer>)),
        )
    }

    /// Score in an external process started from `command`.
    pub fn with_process(
        buffer_size: usize,
        max_in_flight: usize,
        command: Vec<String>,
    ) -> Result<Self, EvaluatorError> {
        info!(command = ?command, "Creating a process to evaluate the leaves");
        Self::spawn(
            buffer_size,
            max_in_flight,
            Box::new(move || Ok(Box::new(ProcessScorer::new(command)) as Box<dyn Scorer>)),
        )
    }

    /// Batches sent to the worker and not yet retrieved.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Distinct leaves queued or being scored.
    pub fn pending(&self) -> usize {
        self.index.len() + self.in_flight.iter().map(|b| b.leaves.len()).sum::<usize>()
    }

    /// Discard queued leaves, outstanding batches and unread results.
    ///
    /// Waits for the worker to answer every batch already sent.
    pub fn clear(&mut self) {
        let outstanding = self.in_flight.len();
        if outstanding > 0 {
            debug!(batches = outstanding, "Discarding outstanding batches");
        }
        // One reply per batch in flight; a stopped worker sends no more.
        while self.in_flight.pop_front().is_some() {
            if self.replies.recv().is_err() {
                break;
            }
        }
        self.in_flight.clear();
        self.index.clear();
        self.results.clear();
    }

    fn dispatch<S: Scorer>(&mut self, evaluator: &mut Evaluator<N, S>) -> Result<(), EvaluatorError> {
        while self.in_flight.len() >= self.max_in_flight {
            self.retrieve(evaluator, true)?;
        }

        let batch = self.index.take();
        let identities: Vec<String> = batch.leaves.iter().map(TreeNode::identity).collect();
        let tasks = self.tasks.as_ref().ok_or(EvaluatorError::WorkerDisconnected)?;
        tasks
            .send(identities)
            .map_err(|_| EvaluatorError::WorkerDisconnected)?;

        debug!(
            batch_size = batch.leaves.len(),
            in_flight = self.in_flight.len() + 1,
            "Batch sent to evaluation worker"
        );
        self.in_flight.push_back(batch);
        Ok(())
    }

    /// Handle the oldest reply. Returns false if `block` is off and none is
    /// ready yet.
    fn retrieve<S: Scorer>(
        &mut self,
        evaluator: &mut Evaluator<N, S>,
        block: bool,
    ) -> Result<bool, EvaluatorError> {
        let reply = if block {
            self.replies
                .recv()
                .map_err(|_| EvaluatorError::WorkerDisconnected)?
        } else {
            match self.replies.try_recv() {
                Ok(reply) => reply,
                Err(TryRecvError::Empty) => return Ok(false),
                Err(TryRecvError::Disconnected) => return Err(EvaluatorError::WorkerDisconnected),
            }
        };

        let batch = self
            .in_flight
            .pop_front()
            .ok_or_else(|| EvaluatorError::Protocol("reply without a pending batch".to_string()))?;
        evaluator.add_time_spent(reply.elapsed);
        let values = reply.values?;
        evaluator.record(&batch.leaves, &values)?;
        debug!(batch_size = batch.leaves.len(), "Batch retrieved from evaluation worker");

        batch.fan_out(&values, &mut self.results);
        Ok(true)
    }
}

impl<N: TreeNode, S: Scorer> EvalBuffer<N, S> for ParallelEvalBuffer<N> {
    fn add(
        &mut self,
        evaluator: &mut Evaluator<N, S>,
        node: NodeId,
        leaf: N,
    ) -> Result<(), EvaluatorError> {
        if let Some(reward) = evaluator.value_from_memory(&leaf) {
            self.results.push(ScoredLeaf { node, leaf, reward });
            return Ok(());
        }

        self.index.insert(leaf, node);
        if self.index.len() >= self.buffer_size {
            self.dispatch(evaluator)?;
        }
        Ok(())
    }

    fn pop_results(
        &mut self,
        evaluator: &mut Evaluator<N, S>,
    ) -> Result<Vec<ScoredLeaf<N>>, EvaluatorError> {
        while !self.in_flight.is_empty() && self.retrieve(evaluator, false)? {}
        Ok(mem::take(&mut self.results))
    }

    fn force_eval(&mut self, evaluator: &mut Evaluator<N, S>) -> Result<(), EvaluatorError> {
        if !self.index.is_empty() {
            self.dispatch(evaluator)?;
        }
        while !self.in_flight.is_empty() {
            self.retrieve(evaluator, true)?;
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        ParallelEvalBuffer::pending(self)
    }

    fn clear(&mut self) {
        ParallelEvalBuffer::clear(self)
    }
}

impl<N> Drop for ParallelEvalBuffer<N> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        // Closing the task channel wakes a worker waiting for work.
        self.tasks.take();
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

fn worker_loop(
    factory: ScorerFactory,
    tasks: Receiver<Vec<String>>,
    replies: Sender<Reply>,
    cancel: Arc<AtomicBool>,
) {
    let built = factory().and_then(|mut scorer| {
        scorer.build()?;
        Ok(scorer)
    });

    let mut scorer = match built {
        Ok(scorer) => scorer,
        Err(e) => {
            warn!(error = %e, "Evaluation worker failed to build its scorer");
            // Surface the failure on the first batch; later sends see a closed channel.
            if tasks.recv().is_ok() {
                let _ = replies.send(Reply {
                    values: Err(e),
                    elapsed: Duration::ZERO,
                });
            }
            return;
        }
    };
    info!("Evaluation worker started");

    while let Ok(batch) = tasks.recv() {
        if cancel.load(Ordering::Acquire) {
            break;
        }

        let start = Instant::now();
        let values = scorer.score(&batch);
        let reply = Reply {
            values,
            elapsed: start.elapsed(),
        };
        if replies.send(reply).is_err() {
            break;
        }
    }

    debug!("Evaluation worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use toy_trees::{scorers, DigitString};

    fn digits() -> Vec<DigitString> {
        DigitString::root(1, 10).children()
    }

    #[test]
    fn test_thread_backend_scores_batches() {
        let mut evaluator = Evaluator::new(scorers::batched(scorers::digit_mean));
        let mut buffer =
            ParallelEvalBuffer::with_thread(2, 2, evaluator.scorer().clone()).unwrap();
        let leaves = digits();

        for (i, leaf) in leaves.iter().take(5).enumerate() {
            buffer.add(&mut evaluator, NodeId(i as u32), leaf.clone()).unwrap();
        }
        assert!(buffer.in_flight() <= 2);
        buffer.force_eval(&mut evaluator).unwrap();
        assert_eq!(buffer.in_flight(), 0);
        assert_eq!(buffer.pending(), 0);

        let mut results = buffer.pop_results(&mut evaluator).unwrap();
        results.sort_by_key(|r| r.node.0);
        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.node, NodeId(i as u32));
            assert!((result.reward - i as f64 / 9.0).abs() < 1e-9);
        }

        // Worker results land in the main evaluator's memo.
        assert!(evaluator.has_already_eval(&leaves[3]));
        assert_eq!(evaluator.best_result().map(|(_, v)| v), Some(4.0 / 9.0));
    }

    #[test]
    fn test_in_flight_window_is_bounded() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let scorer = move |leaves: &[String]| {
            *counter.lock().unwrap() += leaves.len();
            vec![1.0; leaves.len()]
        };
        let mut evaluator = Evaluator::new(scorer.clone());
        let mut buffer = ParallelEvalBuffer::with_thread(1, 1, scorer).unwrap();

        for (i, leaf) in digits().into_iter().enumerate() {
            buffer.add(&mut evaluator, NodeId(i as u32), leaf).unwrap();
            assert!(buffer.in_flight() <= 1);
        }
        buffer.force_eval(&mut evaluator).unwrap();
        assert_eq!(*seen.lock().unwrap(), 10);
        assert_eq!(buffer.pop_results(&mut evaluator).unwrap().len(), 10);
    }

    #[test]
    fn test_duplicates_scored_once_by_worker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let scorer = move |leaves: &[String]| {
            log.lock().unwrap().extend(leaves.iter().cloned());
            vec![0.5; leaves.len()]
        };
        let mut evaluator = Evaluator::new(scorer.clone());
        let mut buffer = ParallelEvalBuffer::with_thread(4, 2, scorer).unwrap();
        let leaf = digits()[7].clone();

        buffer.add(&mut evaluator, NodeId(1), leaf.clone()).unwrap();
        buffer.add(&mut evaluator, NodeId(2), leaf.clone()).unwrap();
        buffer.force_eval(&mut evaluator).unwrap();

        assert_eq!(seen.lock().unwrap().clone(), vec!["#7".to_string()]);
        let results = buffer.pop_results(&mut evaluator).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].reward, results[1].reward);
    }

    #[test]
    fn test_worker_build_failure_is_surfaced() {
        let factory: ScorerFactory =
            Box::new(|| Err(EvaluatorError::ScoringFailed("no model".to_string())));
        let mut buffer = ParallelEvalBuffer::spawn(1, 1, factory).unwrap();
        let mut evaluator = Evaluator::new(scorers::constant(0.0));

        buffer
            .add(&mut evaluator, NodeId(0), digits()[0].clone())
            .unwrap();
        let err = buffer.force_eval(&mut evaluator).unwrap_err();
        assert!(err.to_string().contains("no model"));
    }

    #[test]
    fn test_clear_after_worker_error() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        // The first batch comes back without scores.
        let scorer = move |leaves: &[String]| {
            let mut calls = counter.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Vec::new()
            } else {
                vec![0.25; leaves.len()]
            }
        };
        let mut evaluator = Evaluator::new(scorer.clone());
        let mut buffer = ParallelEvalBuffer::with_thread(1, 3, scorer).unwrap();
        let leaves = digits();

        for (i, leaf) in leaves.iter().take(3).enumerate() {
            buffer.add(&mut evaluator, NodeId(i as u32), leaf.clone()).unwrap();
        }
        let err = buffer.force_eval(&mut evaluator).unwrap_err();
        assert!(matches!(err, EvaluatorError::BatchLengthMismatch { expected: 1, got: 0 }));
        assert_eq!(buffer.in_flight(), 2);

        buffer.clear();
        assert_eq!(buffer.in_flight(), 0);
        assert_eq!(buffer.pending(), 0);

        buffer.add(&mut evaluator, NodeId(9), leaves[9].clone()).unwrap();
        buffer.force_eval(&mut evaluator).unwrap();
        let results = buffer.pop_results(&mut evaluator).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node, NodeId(9));
        assert!((results[0].reward - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_drop_stops_idle_worker() {
        let buffer: ParallelEvalBuffer<DigitString> =
            ParallelEvalBuffer::with_thread(1, 1, scorers::constant(1.0)).unwrap();
        let cancel = Arc::clone(&buffer.cancel);
        drop(buffer);
        assert!(cancel.load(Ordering::Acquire));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_backend() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "while read line; do echo '[0.5]'; done".to_string(),
        ];
        let mut evaluator = Evaluator::new(ProcessScorer::new(command.clone()));
        let mut buffer = ParallelEvalBuffer::with_process(1, 2, command).unwrap();

        buffer
            .add(&mut evaluator, NodeId(3), digits()[2].clone())
            .unwrap();
        buffer.force_eval(&mut evaluator).unwrap();
        let results = buffer.pop_results(&mut evaluator).unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].reward - 0.5).abs() < 1e-9);
        // The search-side scorer was never needed.
        assert!(!evaluator.scorer().is_running());
    }
}
