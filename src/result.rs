// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Results of running steps and hooks.
//!
//! An invocation produces an [`Outcome`], executors fold [`Outcome`]s into an
//! [`ExecutionResult`], and the orchestrator turns that into the
//! [`ExecutionReport`] the host receives.

use std::{ops::ControlFlow, time::Duration};

use crate::{error::SchedulerError, invoke::InvocationError};

/// Diagnostics of a failed or skipped invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Diagnostics {
    /// Error message.
    pub message: String,

    /// Rendered stack trace.
    pub stack_trace: String,

    /// Module or assembly the error originates from.
    pub origin: String,
}

impl Diagnostics {
    /// Extracts [`Diagnostics`] out of the root cause of the `err`.
    ///
    /// Aggregate causes are rendered as their full multi-cause text.
    #[must_use]
    pub fn of(err: &InvocationError) -> Self {
        let root = err.root_cause();
        if root.is_aggregate() {
            Self {
                message: root.full_text(),
                stack_trace: root
                    .causes
                    .iter()
                    .map(|c| c.stack_trace.as_str())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
                origin: root.origin.clone(),
            }
        } else {
            Self {
                message: root.message.clone(),
                stack_trace: root.stack_trace.clone(),
                origin: root.origin.clone(),
            }
        }
    }
}

/// Classified result of a single invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Invocation succeeded.
    Ok,

    /// User code asked to skip the rest of the scenario.
    Skip(Diagnostics),

    /// Invocation failed, but the owning scenario may continue.
    Recoverable(Diagnostics),

    /// Invocation failed.
    Fatal(Diagnostics),
}

impl Outcome {
    /// Classifies the result of invoking a callable.
    #[must_use]
    pub fn classify(
        result: Result<(), InvocationError>,
        continue_on_failure: bool,
    ) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) if e.root_cause().is_skip_scenario() => {
                Self::Skip(Diagnostics::of(&e))
            }
            Err(e) if continue_on_failure => {
                Self::Recoverable(Diagnostics::of(&e))
            }
            Err(e) => Self::Fatal(Diagnostics::of(&e)),
        }
    }
}

/// Result of executing a step or all the hooks of an event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionResult {
    /// Indicator whether execution succeeded. Skipping is a success.
    pub success: bool,

    /// Indicator whether a failure is recoverable.
    pub recoverable: bool,

    /// Indicator whether the rest of the scenario has to be skipped.
    pub skip_scenario: bool,

    /// Message of the last failure or of the skip signal.
    pub exception_message: String,

    /// Stack trace of the last failure or of the skip signal.
    pub stack_trace: String,

    /// Origin of the last failure or of the skip signal.
    pub source: String,
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self::passed()
    }
}

impl ExecutionResult {
    /// Creates a successful [`ExecutionResult`].
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            success: true,
            recoverable: false,
            skip_scenario: false,
            exception_message: String::new(),
            stack_trace: String::new(),
            source: String::new(),
        }
    }

    /// Folds the given [`Outcome`] into this [`ExecutionResult`].
    ///
    /// A later failure overwrites the diagnostics of an earlier one. Breaks
    /// on [`Outcome::Skip`], as nothing else of the event should run then.
    pub fn record(&mut self, outcome: Outcome) -> ControlFlow<()> {
        match outcome {
            Outcome::Ok => ControlFlow::Continue(()),
            Outcome::Skip(d) => {
                self.skip_scenario = true;
                self.set_diagnostics(d);
                ControlFlow::Break(())
            }
            Outcome::Recoverable(d) => {
                self.success = false;
                self.recoverable = true;
                self.set_diagnostics(d);
                ControlFlow::Continue(())
            }
            Outcome::Fatal(d) => {
                self.success = false;
                self.recoverable = false;
                self.set_diagnostics(d);
                ControlFlow::Continue(())
            }
        }
    }

    /// Replaces the diagnostic fields.
    fn set_diagnostics(&mut self, d: Diagnostics) {
        self.exception_message = d.message;
        self.stack_trace = d.stack_trace;
        self.source = d.origin;
    }
}

impl From<Outcome> for ExecutionResult {
    fn from(outcome: Outcome) -> Self {
        let mut result = Self::passed();
        _ = result.record(outcome);
        result
    }
}

/// Result record sent back to the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionReport {
    /// Indicator whether execution failed.
    pub failed: bool,

    /// Time the execution took, in milliseconds.
    pub execution_time_ms: u64,

    /// Error message, if failed or skipped.
    pub error_message: Option<String>,

    /// Stack trace, if failed or skipped.
    pub stack_trace: Option<String>,

    /// Indicator whether the failure is recoverable.
    pub recoverable_error: bool,

    /// Indicator whether the rest of the scenario has to be skipped.
    pub skip_scenario: bool,

    /// Messages written by user code.
    pub messages: Vec<String>,

    /// Screenshot files captured by user code.
    pub screenshot_files: Vec<String>,

    /// Screenshot captured because of the failure, if any.
    pub failure_screenshot_file: Option<String>,
}

impl ExecutionReport {
    /// Builds an [`ExecutionReport`] out of an [`ExecutionResult`].
    #[must_use]
    pub fn new(result: ExecutionResult, elapsed: Duration) -> Self {
        let has_diagnostics = !result.success || result.skip_scenario;
        let non_empty = |s: String| (has_diagnostics && !s.is_empty()).then_some(s);

        Self {
            failed: !result.success,
            execution_time_ms: millis(elapsed),
            error_message: non_empty(result.exception_message),
            stack_trace: non_empty(result.stack_trace),
            recoverable_error: !result.success && result.recoverable,
            skip_scenario: result.skip_scenario,
            ..Self::default()
        }
    }

    /// Creates a failed, non-recoverable [`ExecutionReport`] for an error
    /// detected before anything was invoked.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<SchedulerError> for ExecutionReport {
    fn from(err: SchedulerError) -> Self {
        Self::error(err.to_string())
    }
}

/// Result of initializing a data store, sent back to the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InitReport {
    /// Indicator whether initialization failed.
    pub failed: bool,

    /// Error message, if failed.
    pub error_message: Option<String>,

    /// Stack trace, if failed.
    pub stack_trace: Option<String>,
}

impl InitReport {
    /// Creates a failed [`InitReport`].
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            error_message: Some(message.into()),
            stack_trace: None,
        }
    }
}

impl From<SchedulerError> for InitReport {
    fn from(err: SchedulerError) -> Self {
        Self::error(err.to_string())
    }
}

/// Converts the `elapsed` time into whole milliseconds, saturating.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamId;

    #[test]
    fn classifies_skip_by_root_cause() {
        let err = InvocationError::new("TargetInvocationException", "wrapped")
            .caused_by(InvocationError::new("SkipScenarioException", "not today"));

        let outcome = Outcome::classify(Err(err), false);

        assert_eq!(
            outcome,
            Outcome::Skip(Diagnostics {
                message: "not today".into(),
                ..Diagnostics::default()
            }),
        );
    }

    #[test]
    fn classifies_failures() {
        let err = || InvocationError::new("IOException", "disk").with_origin("Io");

        assert!(matches!(
            Outcome::classify(Err(err()), true),
            Outcome::Recoverable(d) if d.message == "disk" && d.origin == "Io",
        ));
        assert!(matches!(
            Outcome::classify(Err(err()), false),
            Outcome::Fatal(_),
        ));
        assert_eq!(Outcome::classify(Ok(()), false), Outcome::Ok);
    }

    #[test]
    fn aggregate_root_renders_all_causes() {
        let err = InvocationError::aggregate(
            "many",
            [
                InvocationError::new("A", "a").with_stack_trace("at A"),
                InvocationError::new("B", "b").with_stack_trace("at B"),
            ],
        );

        let d = Diagnostics::of(&err);

        assert!(d.message.contains("A: a"));
        assert!(d.message.contains("B: b"));
        assert_eq!(d.stack_trace, "at A\nat B");
    }

    #[test]
    fn last_failure_wins() {
        let mut result = ExecutionResult::passed();
        let fatal = |m: &str| {
            Outcome::Fatal(Diagnostics { message: m.into(), ..Diagnostics::default() })
        };

        assert!(result.record(fatal("first")).is_continue());
        assert!(result.record(Outcome::Ok).is_continue());
        assert!(result.record(fatal("second")).is_continue());

        assert!(!result.success);
        assert_eq!(result.exception_message, "second");
    }

    #[test]
    fn skip_breaks_and_stays_successful() {
        let mut result = ExecutionResult::passed();

        let flow = result.record(Outcome::Skip(Diagnostics {
            message: "skip".into(),
            ..Diagnostics::default()
        }));

        assert!(flow.is_break());
        assert!(result.success);
        assert!(result.skip_scenario);
        assert_eq!(result.exception_message, "skip");
    }

    #[test]
    fn report_of_success_has_no_diagnostics() {
        let report = ExecutionReport::new(
            ExecutionResult::passed(),
            Duration::from_millis(12),
        );

        assert!(!report.failed);
        assert_eq!(report.execution_time_ms, 12);
        assert_eq!(report.error_message, None);
        assert_eq!(report.stack_trace, None);
    }

    #[test]
    fn report_of_recoverable_failure() {
        let result = ExecutionResult::from(Outcome::Recoverable(Diagnostics {
            message: "oops".into(),
            stack_trace: "at step".into(),
            origin: String::new(),
        }));

        let report = ExecutionReport::new(result, Duration::ZERO);

        assert!(report.failed);
        assert!(report.recoverable_error);
        assert_eq!(report.error_message.as_deref(), Some("oops"));
        assert_eq!(report.stack_trace.as_deref(), Some("at step"));
    }

    #[test]
    fn error_report() {
        let report = ExecutionReport::error("Step Implementation not found");

        assert!(report.failed);
        assert!(!report.recoverable_error);
        assert_eq!(report.execution_time_ms, 0);
    }

    #[test]
    fn scheduler_errors_fail_reports() {
        let err = SchedulerError::Disposed { stream: StreamId(2) };
        let report = ExecutionReport::from(err.clone());
        let init = InitReport::from(err);

        assert!(report.failed);
        assert!(init.failed);
        assert_eq!(report.error_message, init.error_message);
    }
}
