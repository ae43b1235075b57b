//! Fan-out of one line stream to any number of attached sinks.
//!
//! A tee is a pass-through stage that accepts repeated `attach` calls. Each
//! line goes to every attached output in attachment order. A failed write
//! detaches only that output; the others keep receiving lines. When no
//! output is left the tee fails like any other stage, closing its input.

use crate::channel::ChannelWriter;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::Stage;
use crate::transform::PassThrough;
use tracing::warn;

/// Create a pass-through tee stage
pub fn tee(name: impl Into<String>) -> Stage<PassThrough> {
    Stage::fan_out(name, PassThrough)
}

/// Outputs of a fan-out stage. Slots of failed outputs stay in place as
/// `None` so log lines keep reporting the original attachment index.
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    outputs: Vec<Option<ChannelWriter>>,
}

impl FanOut {
    pub(crate) fn push(&mut self, writer: ChannelWriter) {
        self.outputs.push(Some(writer));
    }

    /// Number of outputs still open
    pub(crate) fn len(&self) -> usize {
        self.outputs.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `line` and a newline to every open output
    pub(crate) fn deliver(&mut self, stage: &str, line: &str, metrics: &StageMetrics) -> Result<()> {
        for (index, slot) in self.outputs.iter_mut().enumerate() {
            let Some(writer) = slot else {
                continue;
            };
            let written = writer.write_str(line).and_then(|()| writer.write('\n'));
            match written {
                Ok(()) => metrics.record_line_written(),
                Err(e) => {
                    warn!(stage, output = index, error = %e, "tee output closed, detaching it");
                    metrics.record_write_failure();
                    *slot = None;
                }
            }
        }

        if self.is_empty() {
            return Err(PipelineError::Closed);
        }
        Ok(())
    }

    pub(crate) fn close_all(&mut self) {
        self.outputs.clear();
    }
}
