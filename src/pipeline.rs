use crate::error::{PipelineError, Result};
use crate::stage::{Component, StageHandle, StageReport, StageState};
use tracing::{debug, error, info};

/// Collects wired components and starts them together.
///
/// Wire every `attach` before adding components: adding moves them in, and
/// starting consumes the pipeline, so the topology cannot change once any
/// component runs.
#[derive(Default)]
pub struct Pipeline {
    components: Vec<Box<dyn Component>>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component (builder style)
    pub fn with(mut self, component: impl Component) -> Self {
        self.add(component);
        self
    }

    /// Add a component
    pub fn add(&mut self, component: impl Component) -> &mut Self {
        self.components.push(Box::new(component));
        self
    }

    /// Number of components added
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Spawn one thread per component.
    ///
    /// If a spawn fails, the components not yet started are dropped, which
    /// closes their channels and lets the already running ones drain out.
    pub fn start(self) -> Result<RunningPipeline> {
        if self.components.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let mut handles = Vec::with_capacity(self.components.len());
        for component in self.components {
            debug!(name = component.name(), "starting component");
            handles.push(component.start()?);
        }
        info!(components = handles.len(), "pipeline started");

        Ok(RunningPipeline { handles })
    }
}

/// A started pipeline
#[derive(Debug)]
pub struct RunningPipeline {
    handles: Vec<StageHandle>,
}

impl RunningPipeline {
    /// Current state of every component, in the order they were added
    pub fn states(&self) -> Vec<(String, StageState)> {
        self.handles
            .iter()
            .map(|handle| (handle.name().to_string(), handle.state()))
            .collect()
    }

    /// True once every component thread has returned
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(StageHandle::is_finished)
    }

    /// Wait for every component to reach a terminal state.
    ///
    /// Every thread is joined even when one of them panicked; the first
    /// join error is returned after the rest have finished.
    pub fn wait(self) -> Result<PipelineReport> {
        let mut stages = Vec::with_capacity(self.handles.len());
        let mut first_error = None;
        for handle in self.handles {
            match handle.join() {
                Ok(report) => stages.push(report),
                Err(e) => {
                    error!(error = %e, "component thread panicked");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = PipelineReport { stages };
        info!(
            completed = report.stages.len() - report.failed().len(),
            failed = report.failed().len(),
            "pipeline finished"
        );
        Ok(report)
    }
}

/// Final reports of every component in a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Get the report of the component called `name`
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.name == name)
    }

    /// Components that ended in `Failed`
    pub fn failed(&self) -> Vec<&StageReport> {
        self.stages
            .iter()
            .filter(|report| report.state == StageState::Failed)
            .collect()
    }

    /// Check if every component ended in `Completed`
    pub fn all_completed(&self) -> bool {
        self.stages
            .iter()
            .all(|report| report.state == StageState::Completed)
    }

    /// Get a summary of all stage reports
    pub fn summary(&self) -> String {
        let mut summary = String::from("Pipeline Summary:\n");
        for report in &self.stages {
            summary.push_str(&format!(
                "  {} [{}]: {}\n",
                report.name,
                report.state,
                report.metrics.format()
            ));
        }
        summary
    }
}
