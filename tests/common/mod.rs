//! Common test utilities: rendezvous gates, fault injection and wiring helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::time::Duration;
use text_pipeline::{LineHook, PipelineError, Result};

/// Upper bound on how long a test waits for a stage to reach a gate
pub fn test_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Install a test-friendly subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Two-way rendezvous at one line of a stage.
///
/// The stage blocks before the gated line until the test calls
/// [`GateControl::pass`], and `pass` returns only once the stage has
/// written every output of that line.
pub struct Gate {
    line: usize,
    go: Receiver<()>,
    done: Sender<()>,
}

/// Test-side end of a [`Gate`]
pub struct GateControl {
    go: Sender<()>,
    done: Receiver<()>,
}

impl Gate {
    pub fn at_line(line: usize) -> (Gate, GateControl) {
        let (go_tx, go_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        (
            Gate {
                line,
                go: go_rx,
                done: done_tx,
            },
            GateControl {
                go: go_tx,
                done: done_rx,
            },
        )
    }
}

impl LineHook for Gate {
    fn before_line(&self, _stage: &str, line: usize) -> Result<()> {
        if line == self.line {
            self.go
                .recv()
                .map_err(|_| PipelineError::StageError("gate control dropped".into()))?;
        }
        Ok(())
    }

    fn after_line(&self, _stage: &str, line: usize) {
        if line == self.line {
            let _ = self.done.send(());
        }
    }
}

impl GateControl {
    /// Let the stage process the gated line and wait until it has
    pub fn pass(&self) {
        self.go.send(()).expect("gated stage is gone");
        match self.done.recv_timeout(test_timeout()) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => panic!("gated stage did not finish its line"),
            Err(RecvTimeoutError::Disconnected) => panic!("gated stage exited before its line"),
        }
    }
}

/// Raises an I/O error just before the given line is transformed
pub struct FailAt {
    line: usize,
}

impl FailAt {
    pub fn line(line: usize) -> Self {
        Self { line }
    }
}

impl LineHook for FailAt {
    fn before_line(&self, _stage: &str, line: usize) -> Result<()> {
        if line == self.line {
            return Err(io::Error::other(format!("injected fault at line {line}")).into());
        }
        Ok(())
    }
}

/// `count` newline-terminated copies of `line`
pub fn repeat_lines(line: &str, count: usize) -> String {
    let mut text = String::with_capacity((line.len() + 1) * count);
    for _ in 0..count {
        text.push_str(line);
        text.push('\n');
    }
    text
}
