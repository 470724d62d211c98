// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lifecycle information sent by the host, and the [`ExecutionContext`]
//! handed to hooks.

use itertools::Itertools as _;

use crate::{datastore::Stores, hook::Level};

/// Specification currently being executed, as reported by the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SpecInfo {
    /// Specification heading.
    pub name: String,

    /// File the specification is read from.
    pub file_name: String,

    /// Indicator whether anything in the specification has failed so far.
    pub is_failed: bool,

    /// Specification tags.
    pub tags: Vec<String>,
}

/// Retry counters of a scenario.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Retries {
    /// Maximum number of retries.
    pub max: u32,

    /// Current retry, starting from `0`.
    pub current: u32,
}

/// Scenario currently being executed, as reported by the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScenarioInfo {
    /// Scenario heading.
    pub name: String,

    /// Indicator whether anything in the scenario has failed so far.
    pub is_failed: bool,

    /// Scenario tags.
    pub tags: Vec<String>,

    /// [`Retries`] of the scenario.
    pub retries: Retries,
}

/// Step currently being executed, as reported by the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StepInfo {
    /// Step text as written in the specification.
    pub text: String,

    /// Parameter-erased step text.
    pub parsed_text: String,

    /// Indicator whether the step has failed.
    pub is_failed: bool,

    /// Error message of the failure, if any.
    pub error_message: String,

    /// Stack trace of the failure, if any.
    pub stack_trace: String,
}

/// Lifecycle information accompanying each hook-running request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionInfo {
    /// Current [`SpecInfo`], if inside a specification.
    pub spec: Option<SpecInfo>,

    /// Current [`ScenarioInfo`], if inside a scenario.
    pub scenario: Option<ScenarioInfo>,

    /// Current [`StepInfo`], if inside a step.
    pub step: Option<StepInfo>,
}

impl ExecutionInfo {
    /// Returns the tags hooks of the given [`Level`] are selected by.
    ///
    /// Suite hooks see no tags, spec hooks see the spec ones, and everything
    /// below sees scenario tags followed by spec tags, without duplicates.
    #[must_use]
    pub fn applicable_tags(&self, level: Level) -> Vec<String> {
        let spec_tags = self.spec.iter().flat_map(|s| &s.tags);
        let scenario_tags = self.scenario.iter().flat_map(|s| &s.tags);

        match level {
            Level::Suite => Vec::new(),
            Level::Spec => spec_tags.unique().cloned().collect(),
            Level::Scenario | Level::Step | Level::Concept => {
                scenario_tags.chain(spec_tags).unique().cloned().collect()
            }
        }
    }
}

/// Specification as seen by a hook.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Specification {
    /// Specification heading.
    pub name: String,

    /// File the specification is read from.
    pub file_name: String,

    /// Indicator whether anything in the specification has failed so far.
    pub is_failing: bool,

    /// Specification tags.
    pub tags: Vec<String>,
}

/// Scenario as seen by a hook.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Scenario {
    /// Scenario heading.
    pub name: String,

    /// Indicator whether anything in the scenario has failed so far.
    pub is_failing: bool,

    /// Scenario tags.
    pub tags: Vec<String>,

    /// Maximum number of retries.
    pub max_retries: u32,

    /// Current retry, starting from `0`.
    pub current_retry: u32,
}

/// Step as seen by a hook.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StepDetails {
    /// Step text as written in the specification.
    pub text: String,

    /// Indicator whether the step has failed.
    pub is_failing: bool,

    /// Error message of the failure, if any.
    pub error_message: String,

    /// Stack trace of the failure, if any.
    pub stack_trace: String,
}

/// Context every hook is invoked with.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    /// Current [`Specification`], if any.
    pub specification: Option<Specification>,

    /// Current [`Scenario`], if any.
    pub scenario: Option<Scenario>,

    /// Current step, if any.
    pub step: Option<StepDetails>,

    /// Data stores of the stream the hook runs on.
    pub stores: Stores,
}

impl ExecutionContext {
    /// Builds a fresh [`ExecutionContext`] out of the host's
    /// [`ExecutionInfo`].
    #[must_use]
    pub fn new(info: &ExecutionInfo, stores: Stores) -> Self {
        Self {
            specification: info.spec.as_ref().map(|s| Specification {
                name: s.name.clone(),
                file_name: s.file_name.clone(),
                is_failing: s.is_failed,
                tags: s.tags.clone(),
            }),
            scenario: info.scenario.as_ref().map(|s| Scenario {
                name: s.name.clone(),
                is_failing: s.is_failed,
                tags: s.tags.clone(),
                max_retries: s.retries.max,
                current_retry: s.retries.current,
            }),
            step: info.step.as_ref().map(|s| StepDetails {
                text: s.text.clone(),
                is_failing: s.is_failed,
                error_message: s.error_message.clone(),
                stack_trace: s.stack_trace.clone(),
            }),
            stores,
        }
    }

    /// Returns all the tags in scope: scenario ones followed by spec ones.
    #[must_use]
    pub fn all_tags(&self) -> Vec<&str> {
        self.scenario
            .iter()
            .flat_map(|s| &s.tags)
            .chain(self.specification.iter().flat_map(|s| &s.tags))
            .map(String::as_str)
            .unique()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ExecutionInfo {
        ExecutionInfo {
            spec: Some(SpecInfo {
                name: "Login".into(),
                file_name: "specs/login.spec".into(),
                is_failed: false,
                tags: vec!["web".into(), "smoke".into()],
            }),
            scenario: Some(ScenarioInfo {
                name: "Valid user".into(),
                is_failed: true,
                tags: vec!["smoke".into(), "auth".into()],
                retries: Retries { max: 2, current: 1 },
            }),
            step: None,
        }
    }

    #[test]
    fn tags_per_level() {
        let info = info();

        assert!(info.applicable_tags(Level::Suite).is_empty());
        assert_eq!(info.applicable_tags(Level::Spec), ["web", "smoke"]);
        for level in [Level::Scenario, Level::Step, Level::Concept] {
            assert_eq!(
                info.applicable_tags(level),
                ["smoke", "auth", "web"],
            );
        }
    }

    #[test]
    fn missing_info_yields_no_tags() {
        assert!(ExecutionInfo::default()
            .applicable_tags(Level::Scenario)
            .is_empty());
    }

    #[test]
    fn maps_info_into_context() {
        let ctx = ExecutionContext::new(&info(), Stores::default());

        let spec = ctx.specification.as_ref().unwrap();
        assert_eq!(spec.file_name, "specs/login.spec");
        assert!(!spec.is_failing);

        let scenario = ctx.scenario.as_ref().unwrap();
        assert!(scenario.is_failing);
        assert_eq!((scenario.max_retries, scenario.current_retry), (2, 1));

        assert!(ctx.step.is_none());
        assert_eq!(ctx.all_tags(), ["smoke", "auth", "web"]);
    }
}
