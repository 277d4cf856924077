//! Scoring in an external process.
//!
//! The process reads one JSON array of leaf identities per line on stdin and
//! answers each with one JSON array of numbers on stdout, same length and
//! order. Anything it writes to stderr is passed through.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, info};

use crate::evaluator::{EvaluatorError, Scorer};

struct Worker {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

/// Scorer backed by a child process speaking JSON lines.
///
/// The process is started by [`Scorer::build`] (or the first batch) and
/// killed when the scorer is dropped. Cloning yields an unstarted scorer
/// for the same command.
pub struct ProcessScorer {
    command: Vec<String>,
    worker: Option<Worker>,
}

impl ProcessScorer {
    /// `command[0]` is the program, the rest its arguments.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            worker: None,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn start(&mut self) -> Result<&mut Worker, EvaluatorError> {
        if self.worker.is_none() {
            let (program, args) = self
                .command
                .split_first()
                .ok_or_else(|| EvaluatorError::Protocol("empty worker command".to_string()))?;

            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()?;
            info!(program = %program, pid = child.id(), "Scoring process started");

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| EvaluatorError::Protocol("worker stdin unavailable".to_string()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| EvaluatorError::Protocol("worker stdout unavailable".to_string()))?;

            self.worker = Some(Worker {
                child,
                stdin: BufWriter::new(stdin),
                stdout: BufReader::new(stdout),
            });
        }

        self.worker
            .as_mut()
            .ok_or(EvaluatorError::WorkerDisconnected)
    }
}

impl Clone for ProcessScorer {
    fn clone(&self) -> Self {
        Self::new(self.command.clone())
    }
}

impl Scorer for ProcessScorer {
    fn build(&mut self) -> Result<(), EvaluatorError> {
        self.start().map(|_| ())
    }

    fn score(&mut self, leaves: &[String]) -> Result<Vec<f64>, EvaluatorError> {
        let request = serde_json::to_string(leaves)
            .map_err(|e| EvaluatorError::Protocol(format!("cannot encode request: {}", e)))?;

        let worker = self.start()?;
        writeln!(worker.stdin, "{}", request)?;
        worker.stdin.flush()?;

        let mut response = String::new();
        if worker.stdout.read_line(&mut response)? == 0 {
            return Err(EvaluatorError::Protocol(
                "scoring process closed its output".to_string(),
            ));
        }

        serde_json::from_str(response.trim()).map_err(|e| {
            EvaluatorError::Protocol(format!("invalid response '{}': {}", response.trim(), e))
        })
    }
}

impl Drop for ProcessScorer {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.child.kill();
            let _ = worker.child.wait();
            debug!("Scoring process stopped");
        }
    }
}
