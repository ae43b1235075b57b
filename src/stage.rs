//! Stage lifecycle, the Source/Sink wiring contracts and the line-oriented
//! processing loop shared by every transforming stage.
//!
//! Every stage runs on its own thread. It reads its input channel into
//! newline-terminated lines, hands each complete line to its [`LineTransform`]
//! and writes the produced lines to its output(s). Shutdown protocol:
//!
//! - clean end-of-stream: close every output, enter `Completed`;
//! - any read/write/transform error: log it, close every output and the
//!   input, enter `Failed`. Errors are never retried and never escape the
//!   stage thread.
//!
//! Closing the input makes the upstream writer's next write fail, so a
//! single failure drains the whole chain in both directions.

use crate::channel::{channel, ChannelReader, ChannelWriter, DEFAULT_CAPACITY};
use crate::error::{PipelineError, Result};
use crate::hooks::LineHook;
use crate::metrics::{MetricsSnapshot, StageMetrics};
use crate::tee::FanOut;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info_span, warn};

/// A component that produces a character stream
pub trait Source {
    /// Create a new channel, hand its reading half to `sink` and keep the
    /// writing half. Fails with `AlreadyConnected` when this source cannot
    /// take another output.
    fn attach(&mut self, sink: &mut dyn Sink) -> Result<()>;
}

/// A component that consumes a character stream
pub trait Sink {
    /// Accept the reading half of a channel. Callable once.
    fn set_input(&mut self, input: ChannelReader) -> Result<()>;
}

/// Lifecycle of a stage. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StageState {
    Created = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl StageState {
    /// True for `Completed` and `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, StageState::Completed | StageState::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StageState::Created,
            1 => StageState::Running,
            2 => StageState::Completed,
            _ => StageState::Failed,
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StageState::Created => "created",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// State cell shared between a stage thread and its handle
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(StageState::Created as u8)))
    }

    pub(crate) fn get(&self) -> StageState {
        StageState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless a terminal state has already been reached
    pub(crate) fn set(&self, next: StageState) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                if StageState::from_u8(raw).is_terminal() {
                    None
                } else {
                    Some(next as u8)
                }
            });
    }
}

/// Per-stage settings applied when a sink attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    /// Capacity, in code units, of each output channel this stage creates
    pub channel_capacity: usize,
}

impl StageConfig {
    /// Set the channel capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Per-line work performed by a stage.
///
/// `transform` must not block; it may return zero or more output lines,
/// each written followed by a newline. `flush` runs once after a clean
/// end-of-stream.
pub trait LineTransform: Send + 'static {
    fn transform(&mut self, line: &str) -> Result<Vec<String>>;

    fn flush(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "transform"
    }
}

/// Final outcome of a stage thread
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub state: StageState,
    pub metrics: MetricsSnapshot,
}

impl StageReport {
    pub(crate) fn new(name: &str, state: StageState, metrics: &StageMetrics) -> Self {
        Self {
            name: name.to_string(),
            state,
            metrics: metrics.snapshot(),
        }
    }
}

/// Handle to a started stage
#[derive(Debug)]
pub struct StageHandle {
    name: String,
    state: SharedState,
    handle: JoinHandle<StageReport>,
}

impl StageHandle {
    /// Get the stage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state of the stage
    pub fn state(&self) -> StageState {
        self.state.get()
    }

    /// Check if the stage thread has returned
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the stage thread to finish
    pub fn join(self) -> Result<StageReport> {
        self.handle
            .join()
            .map_err(|_| PipelineError::ThreadError(format!("stage {} panicked", self.name)))
    }
}

/// Anything the orchestrator can start: stages and terminal adapters
pub trait Component: Send + 'static {
    fn name(&self) -> &str;

    /// Spawn the component's thread. Starting consumes the component, so
    /// its wiring is frozen from here on.
    fn start(self: Box<Self>) -> Result<StageHandle>;
}

/// Spawn a named thread running `body` inside a span for the stage
pub(crate) fn spawn_component<F>(name: &str, state: SharedState, body: F) -> Result<StageHandle>
where
    F: FnOnce() -> StageReport + Send + 'static,
{
    let span_name = name.to_string();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let span = info_span!("stage", name = %span_name);
            let _entered = span.enter();
            body()
        })
        .map_err(|source| PipelineError::Spawn {
            name: name.to_string(),
            source,
        })?;

    Ok(StageHandle {
        name: name.to_string(),
        state,
        handle,
    })
}

/// Create a channel for `sink` and store the writing half in `slot`
pub(crate) fn connect_output(
    slot: &mut Option<ChannelWriter>,
    capacity: usize,
    sink: &mut dyn Sink,
) -> Result<()> {
    if slot.is_some() {
        return Err(PipelineError::AlreadyConnected("output"));
    }
    let (writer, reader) = channel(capacity);
    sink.set_input(reader)?;
    *slot = Some(writer);
    Ok(())
}

/// Store `input` in `slot` unless an input is already present
pub(crate) fn connect_input(slot: &mut Option<ChannelReader>, input: ChannelReader) -> Result<()> {
    if slot.is_some() {
        return Err(PipelineError::AlreadyConnected("input"));
    }
    *slot = Some(input);
    Ok(())
}

/// Output side of a stage: one channel, or a growing fan-out set
#[derive(Debug)]
enum Outputs {
    Single(Option<ChannelWriter>),
    FanOut(FanOut),
}

impl Outputs {
    fn is_empty(&self) -> bool {
        match self {
            Outputs::Single(slot) => slot.is_none(),
            Outputs::FanOut(fan_out) => fan_out.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Outputs::Single(slot) => usize::from(slot.is_some()),
            Outputs::FanOut(fan_out) => fan_out.len(),
        }
    }

    fn connect(&mut self, capacity: usize, sink: &mut dyn Sink) -> Result<()> {
        match self {
            Outputs::Single(slot) => connect_output(slot, capacity, sink),
            Outputs::FanOut(fan_out) => {
                let (writer, reader) = channel(capacity);
                sink.set_input(reader)?;
                fan_out.push(writer);
                Ok(())
            }
        }
    }

    fn deliver(&mut self, stage: &str, line: &str, metrics: &StageMetrics) -> Result<()> {
        match self {
            Outputs::Single(Some(writer)) => {
                let written = writer.write_str(line).and_then(|()| writer.write('\n'));
                match written {
                    Ok(()) => {
                        metrics.record_line_written();
                        Ok(())
                    }
                    Err(e) => {
                        metrics.record_write_failure();
                        Err(e)
                    }
                }
            }
            Outputs::Single(None) => Err(PipelineError::Closed),
            Outputs::FanOut(fan_out) => fan_out.deliver(stage, line, metrics),
        }
    }

    /// Drop every writer, signalling end-of-stream downstream
    fn close_all(&mut self) {
        match self {
            Outputs::Single(slot) => {
                slot.take();
            }
            Outputs::FanOut(fan_out) => fan_out.close_all(),
        }
    }
}

/// A line-oriented pipeline stage driving a [`LineTransform`]
pub struct Stage<T: LineTransform> {
    name: String,
    transform: T,
    input: Option<ChannelReader>,
    outputs: Outputs,
    config: StageConfig,
    hooks: Vec<Arc<dyn LineHook>>,
    metrics: StageMetrics,
    state: SharedState,
}

impl<T: LineTransform> Stage<T> {
    /// Create a stage with a single output
    pub fn new(name: impl Into<String>, transform: T) -> Self {
        Self::with_outputs(name.into(), transform, Outputs::Single(None))
    }

    /// Create a stage whose `attach` may be called any number of times;
    /// every produced line goes to every attached output.
    pub fn fan_out(name: impl Into<String>, transform: T) -> Self {
        Self::with_outputs(name.into(), transform, Outputs::FanOut(FanOut::default()))
    }

    fn with_outputs(name: String, transform: T, outputs: Outputs) -> Self {
        Self {
            name,
            transform,
            input: None,
            outputs,
            config: StageConfig::default(),
            hooks: Vec::new(),
            metrics: StageMetrics::new(),
            state: SharedState::new(),
        }
    }

    /// Set the stage configuration
    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    /// Capacity of channels created by later `attach` calls
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity(capacity);
        self
    }

    /// Register a hook called around every line
    pub fn with_hook(mut self, hook: Arc<dyn LineHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Get the stage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> StageState {
        self.state.get()
    }

    /// Get a reference to the transform
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Shared view of this stage's counters
    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    /// Number of attached outputs
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Check if an input has been connected
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Spawn the stage thread
    pub fn start(self) -> Result<StageHandle> {
        let name = self.name.clone();
        let state = self.state.clone();
        spawn_component(&name, state, move || self.run())
    }

    fn run(mut self) -> StageReport {
        self.state.set(StageState::Running);
        debug!(transform = self.transform.name(), "stage running");

        let outcome = match self.input.take() {
            Some(input) if !self.outputs.is_empty() => self.pump(input),
            input => {
                debug!("stage not fully connected, nothing to do");
                drop(input);
                Ok(())
            }
        };

        self.outputs.close_all();
        let state = match outcome {
            Ok(()) => StageState::Completed,
            Err(e) => {
                warn!(error = %e, "stage failed, closing input and outputs");
                StageState::Failed
            }
        };
        self.state.set(state);
        debug!(%state, "stage finished");
        StageReport::new(&self.name, state, &self.metrics)
    }

    /// Read lines until end-of-stream. The input is dropped on return,
    /// which closes it for the upstream writer.
    fn pump(&mut self, input: ChannelReader) -> Result<()> {
        let mut line = String::new();
        let mut line_no = 0;

        for c in input.chars() {
            if c == '\n' {
                line_no += 1;
                self.process_line(line_no, &line)?;
                line.clear();
            } else {
                line.push(c);
            }
        }

        if !line.is_empty() {
            self.metrics.record_fragment_discarded();
            debug!(len = line.len(), "discarding unterminated trailing fragment");
        }

        for out in self.transform.flush()? {
            self.outputs.deliver(&self.name, &out, &self.metrics)?;
        }
        Ok(())
    }

    fn process_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        for hook in &self.hooks {
            hook.before_line(&self.name, line_no)?;
        }
        self.metrics.record_line_read();

        let started = Instant::now();
        let produced = self.transform.transform(line)?;
        for out in &produced {
            self.outputs.deliver(&self.name, out, &self.metrics)?;
        }
        self.metrics.record_latency(started.elapsed());

        for hook in &self.hooks {
            hook.after_line(&self.name, line_no);
        }
        Ok(())
    }
}

impl<T: LineTransform> Source for Stage<T> {
    fn attach(&mut self, sink: &mut dyn Sink) -> Result<()> {
        self.outputs.connect(self.config.channel_capacity, sink)
    }
}

impl<T: LineTransform> Sink for Stage<T> {
    fn set_input(&mut self, input: ChannelReader) -> Result<()> {
        connect_input(&mut self.input, input)
    }
}

impl<T: LineTransform> Component for Stage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(self: Box<Self>) -> Result<StageHandle> {
        (*self).start()
    }
}

impl<T: LineTransform> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("transform", &self.transform.name())
            .field("has_input", &self.input.is_some())
            .field("outputs", &self.outputs.len())
            .field("state", &self.state.get())
            .finish()
    }
}
