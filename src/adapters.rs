//! Terminal adapters: the endpoints that feed text into a pipeline and
//! collect what comes out. Each runs on its own thread like a stage but does
//! no line processing.

use crate::channel::{ChannelReader, ChannelWriter};
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{
    connect_input, connect_output, spawn_component, Component, SharedState, Sink, Source,
    StageConfig, StageHandle, StageReport, StageState,
};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Write `text` to `output`, counting completed lines
fn pump_text(output: &ChannelWriter, text: &str, metrics: &StageMetrics) -> Result<()> {
    for c in text.chars() {
        output.write(c)?;
        if c == '\n' {
            metrics.record_line_written();
        }
    }
    Ok(())
}

fn finish(name: &str, state: &SharedState, outcome: Result<()>, metrics: &StageMetrics) -> StageReport {
    let final_state = match outcome {
        Ok(()) => StageState::Completed,
        Err(e) => {
            warn!(error = %e, "adapter failed");
            StageState::Failed
        }
    };
    state.set(final_state);
    debug!(state = %final_state, "adapter finished");
    StageReport::new(name, final_state, metrics)
}

/// Source that streams an in-memory string then closes its output
#[derive(Debug)]
pub struct StringSource {
    name: String,
    text: String,
    output: Option<ChannelWriter>,
    config: StageConfig,
    metrics: StageMetrics,
    state: SharedState,
}

impl StringSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            name: "string-source".to_string(),
            text: text.into(),
            output: None,
            config: StageConfig::default(),
            metrics: StageMetrics::new(),
            state: SharedState::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity(capacity);
        self
    }

    pub fn start(self) -> Result<StageHandle> {
        let name = self.name.clone();
        let state = self.state.clone();
        spawn_component(&name, state, move || self.run())
    }

    fn run(self) -> StageReport {
        self.state.set(StageState::Running);
        let outcome = match &self.output {
            Some(output) => pump_text(output, &self.text, &self.metrics),
            None => Ok(()),
        };
        drop(self.output);
        finish(&self.name, &self.state, outcome, &self.metrics)
    }
}

impl Source for StringSource {
    fn attach(&mut self, sink: &mut dyn Sink) -> Result<()> {
        connect_output(&mut self.output, self.config.channel_capacity, sink)
    }
}

impl Component for StringSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(self: Box<Self>) -> Result<StageHandle> {
        (*self).start()
    }
}

/// Source that streams a file line by line, newlines preserved
#[derive(Debug)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    reader: BufReader<File>,
    output: Option<ChannelWriter>,
    config: StageConfig,
    metrics: StageMetrics,
    state: SharedState,
}

impl FileSource {
    /// Open `path` for reading; a missing file fails here, at setup
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            name: format!("file-source:{}", path.display()),
            path,
            reader: BufReader::new(file),
            output: None,
            config: StageConfig::default(),
            metrics: StageMetrics::new(),
            state: SharedState::new(),
        })
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity(capacity);
        self
    }

    /// Get the path being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start(self) -> Result<StageHandle> {
        let name = self.name.clone();
        let state = self.state.clone();
        spawn_component(&name, state, move || self.run())
    }

    fn run(mut self) -> StageReport {
        self.state.set(StageState::Running);
        let outcome = match self.output.take() {
            Some(output) => Self::stream(&mut self.reader, &output, &self.metrics),
            None => Ok(()),
        };
        finish(&self.name, &self.state, outcome, &self.metrics)
    }

    fn stream(reader: &mut BufReader<File>, output: &ChannelWriter, metrics: &StageMetrics) -> Result<()> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                return Ok(());
            }
            pump_text(output, &buf, metrics)?;
        }
    }
}

impl Source for FileSource {
    fn attach(&mut self, sink: &mut dyn Sink) -> Result<()> {
        connect_output(&mut self.output, self.config.channel_capacity, sink)
    }
}

impl Component for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(self: Box<Self>) -> Result<StageHandle> {
        (*self).start()
    }
}

/// Read handle on the text accumulated by a [`StringSink`]
#[derive(Debug, Clone, Default)]
pub struct SinkOutput(Arc<Mutex<String>>);

impl SinkOutput {
    /// Everything received so far
    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }

    /// Complete lines received so far, without their newlines
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().lines().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn append(&self, text: &str) {
        self.0.lock().push_str(text);
    }
}

/// Sink that drains its input into memory
#[derive(Debug)]
pub struct StringSink {
    name: String,
    input: Option<ChannelReader>,
    output: SinkOutput,
    metrics: StageMetrics,
    state: SharedState,
}

impl StringSink {
    pub fn new() -> Self {
        Self {
            name: "string-sink".to_string(),
            input: None,
            output: SinkOutput::default(),
            metrics: StageMetrics::new(),
            state: SharedState::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Handle for reading the collected text, valid after the sink starts
    pub fn output(&self) -> SinkOutput {
        self.output.clone()
    }

    pub fn start(self) -> Result<StageHandle> {
        let name = self.name.clone();
        let state = self.state.clone();
        spawn_component(&name, state, move || self.run())
    }

    fn run(self) -> StageReport {
        self.state.set(StageState::Running);
        if let Some(input) = &self.input {
            let mut pending = String::new();
            for c in input.chars() {
                pending.push(c);
                if c == '\n' {
                    self.metrics.record_line_read();
                    self.output.append(&pending);
                    pending.clear();
                }
            }
            self.output.append(&pending);
        }
        finish(&self.name, &self.state, Ok(()), &self.metrics)
    }
}

impl Default for StringSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StringSink {
    fn set_input(&mut self, input: ChannelReader) -> Result<()> {
        connect_input(&mut self.input, input)
    }
}

impl Component for StringSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(self: Box<Self>) -> Result<StageHandle> {
        (*self).start()
    }
}

/// Sink that writes its input to a file
#[derive(Debug)]
pub struct FileSink {
    name: String,
    writer: BufWriter<File>,
    input: Option<ChannelReader>,
    metrics: StageMetrics,
    state: SharedState,
}

impl FileSink {
    /// Create or truncate `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Self {
            name: format!("file-sink:{}", path.display()),
            writer: BufWriter::new(file),
            input: None,
            metrics: StageMetrics::new(),
            state: SharedState::new(),
        })
    }

    pub fn start(self) -> Result<StageHandle> {
        let name = self.name.clone();
        let state = self.state.clone();
        spawn_component(&name, state, move || self.run())
    }

    fn run(mut self) -> StageReport {
        self.state.set(StageState::Running);
        let outcome = match self.input.take() {
            Some(input) => Self::drain(&input, &mut self.writer, &self.metrics),
            None => Ok(()),
        };
        let outcome = outcome.and_then(|()| self.writer.flush().map_err(PipelineError::from));
        finish(&self.name, &self.state, outcome, &self.metrics)
    }

    fn drain(input: &ChannelReader, writer: &mut BufWriter<File>, metrics: &StageMetrics) -> Result<()> {
        let mut utf8 = [0u8; 4];
        for c in input.chars() {
            writer.write_all(c.encode_utf8(&mut utf8).as_bytes())?;
            if c == '\n' {
                metrics.record_line_read();
            }
        }
        Ok(())
    }
}

impl Sink for FileSink {
    fn set_input(&mut self, input: ChannelReader) -> Result<()> {
        connect_input(&mut self.input, input)
    }
}

impl Component for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(self: Box<Self>) -> Result<StageHandle> {
        (*self).start()
    }
}
