// Session state: the single-writer coordinator over frames, bundles, scenarios

use chrono::Utc;
use tracing::info;

use crate::config::EngineConfig;
use crate::diagnostics::RunDiagnostics;
use crate::domain::CleanFrame;
use crate::forecasting::{
    CancellationFlag, ForecastBundle, ForecastDispatcher, ForecastError, RunOutcome, RunRequest,
};
use crate::scenario::{apply_scenario, Scenario, ScenarioError, ScenarioRecord};

/// Session error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A forecast run is in progress; writers must wait")]
    ForecastInProgress,

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),
}

/// How a session-level forecast run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The bundle was published; read it with [`Session::bundle`].
    Completed,
    /// The run observed the cancellation flag; nothing was published.
    Cancelled,
}

/// All mutable state for one loaded history.
///
/// Writers (scenario application, frame replacement, reset) go through
/// `&mut self` and are additionally rejected while `is_forecasting` is set,
/// so the frame stays read-only for the duration of a run. The bundle is
/// published in one assignment after the run completes.
pub struct Session {
    original: CleanFrame,
    current: CleanFrame,
    bundle: Option<ForecastBundle>,
    diagnostics: Option<RunDiagnostics>,
    history: Vec<ScenarioRecord>,
    cancel: CancellationFlag,
    is_forecasting: bool,
    config: EngineConfig,
}

impl Session {
    pub fn new(frame: CleanFrame, config: EngineConfig) -> Self {
        Self {
            original: frame.clone(),
            current: frame,
            bundle: None,
            diagnostics: None,
            history: Vec::new(),
            cancel: CancellationFlag::new(),
            is_forecasting: false,
            config,
        }
    }

    pub fn frame(&self) -> &CleanFrame {
        &self.current
    }

    pub fn original_frame(&self) -> &CleanFrame {
        &self.original
    }

    pub fn bundle(&self) -> Option<&ForecastBundle> {
        self.bundle.as_ref()
    }

    pub fn diagnostics(&self) -> Option<&RunDiagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn history(&self) -> &[ScenarioRecord] {
        &self.history
    }

    /// Per-SKU statistics over the current frame.
    pub fn sku_summaries(&self) -> Vec<crate::domain::SkuSummary> {
        crate::domain::SkuSummary::compute(&self.current)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A handle other threads can use to request cancellation.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Rewrite the current frame with a scenario; the original is retained
    /// for [`Session::reset_scenarios`].
    pub fn apply_scenario(&mut self, scenario: Scenario) -> Result<(), SessionError> {
        self.guard_writer()?;
        let rewritten = apply_scenario(&self.current, &scenario, &self.config)?;
        self.current = rewritten;
        self.history.push(ScenarioRecord {
            scenario,
            applied_at: Utc::now(),
        });
        Ok(())
    }

    /// Restore the originally loaded frame and clear the scenario history.
    pub fn reset_scenarios(&mut self) -> Result<(), SessionError> {
        self.guard_writer()?;
        self.current = self.original.clone();
        self.history.clear();
        info!("scenario history reset");
        Ok(())
    }

    /// Load a new history, discarding the bundle, encoders, and scenarios
    /// derived from the previous one.
    pub fn replace_frame(&mut self, frame: CleanFrame) -> Result<(), SessionError> {
        self.guard_writer()?;
        self.original = frame.clone();
        self.current = frame;
        self.bundle = None;
        self.diagnostics = None;
        self.history.clear();
        info!("frame replaced");
        Ok(())
    }

    /// Run a forecast over the current frame and publish the bundle.
    pub fn run_forecast(&mut self, request: &RunRequest) -> Result<RunStatus, SessionError> {
        if self.is_forecasting {
            return Err(SessionError::ForecastInProgress);
        }

        self.cancel.reset();
        self.is_forecasting = true;
        let dispatcher = ForecastDispatcher::new(self.config.clone());
        let outcome = dispatcher.run(&self.current, request, &self.cancel);
        self.is_forecasting = false;

        match outcome? {
            RunOutcome::Completed {
                bundle,
                diagnostics,
            } => {
                self.bundle = Some(bundle);
                self.diagnostics = Some(diagnostics);
                Ok(RunStatus::Completed)
            }
            RunOutcome::Cancelled => Ok(RunStatus::Cancelled),
        }
    }

    fn guard_writer(&self) -> Result<(), SessionError> {
        if self.is_forecasting {
            return Err(SessionError::ForecastInProgress);
        }
        Ok(())
    }
}
