//! A streaming text-transformation pipeline built from independent stages.
//!
//! Every stage runs on its own thread and talks to its neighbours over
//! bounded, blocking, single-producer/single-consumer character channels.
//! Line-oriented stages split their input into newline-terminated lines and
//! run a per-line transform on each.
//!
//! # Features
//!
//! - Bounded blocking channels built on crossbeam, closed by dropping an end
//! - Stage lifecycle with a shutdown protocol that drains the chain forward
//!   and backward after any single failure
//! - Pattern replacement with regex capture groups
//! - Tee fan-out to any number of sinks
//! - A shared binding table feeding binder and binding-replacer stages,
//!   whose relative progress is an intentionally observable race
//! - Per-line hooks for forcing orderings and injecting faults in tests
//! - Per-stage metrics: lines read/written, write failures, latency percentiles
//!
//! # Example
//!
//! ```ignore
//! use text_pipeline::{pattern_replace, Pipeline, Source, StringSink, StringSource};
//!
//! let mut source = StringSource::new("hello world\n");
//! let mut replace = pattern_replace("replace", "world", "mum")?;
//! let mut sink = StringSink::new();
//! source.attach(&mut replace)?;
//! replace.attach(&mut sink)?;
//! let output = sink.output();
//!
//! Pipeline::new().with(source).with(replace).with(sink).start()?.wait()?;
//! assert_eq!(output.contents(), "hello mum\n");
//! ```

pub mod adapters;
pub mod binder;
pub mod binding;
pub mod channel;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod stage;
pub mod tee;
pub mod transform;

// Re-exports for convenience
pub use adapters::{FileSink, FileSource, SinkOutput, StringSink, StringSource};
pub use binder::{binder, binding_inserter, binding_replacer, BindMode, Binder, BindingReplacer};
pub use binding::BindingTable;
pub use channel::{channel, ChannelReader, ChannelWriter, DEFAULT_CAPACITY};
pub use error::{PipelineError, Result};
pub use hooks::LineHook;
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineReport, RunningPipeline};
pub use stage::{
    Component, LineTransform, Sink, Source, Stage, StageConfig, StageHandle, StageReport,
    StageState,
};
pub use tee::tee;
pub use transform::{pass_through, pattern_replace, PassThrough, PatternReplacer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
