// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hooks bound to lifecycle events, and their tag-based selection.

pub mod registry;
pub mod strategy;

use derive_more::with_trait::Display;

use crate::invoke::Callable;

pub use self::{
    registry::Registry,
    strategy::{Plain, Strategy, TaggedHooksFirst, UntaggedHooksFirst},
};

/// Lifecycle event a hook is bound to.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{self:?}")]
pub enum HookType {
    /// Before the whole test run.
    BeforeSuite,

    /// After the whole test run.
    AfterSuite,

    /// Before each specification.
    BeforeSpec,

    /// After each specification.
    AfterSpec,

    /// Before each scenario.
    BeforeScenario,

    /// After each scenario.
    AfterScenario,

    /// Before each step.
    BeforeStep,

    /// After each step.
    AfterStep,

    /// Before each concept.
    BeforeConcept,

    /// After each concept.
    AfterConcept,
}

/// Granularity of a [`HookType`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Level {
    /// Whole test run.
    Suite,

    /// Single specification.
    Spec,

    /// Single scenario.
    Scenario,

    /// Single step.
    Step,

    /// Single concept.
    Concept,
}

impl HookType {
    /// Returns the [`Level`] this [`HookType`] fires at.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::BeforeSuite | Self::AfterSuite => Level::Suite,
            Self::BeforeSpec | Self::AfterSpec => Level::Spec,
            Self::BeforeScenario | Self::AfterScenario => Level::Scenario,
            Self::BeforeStep | Self::AfterStep => Level::Step,
            Self::BeforeConcept | Self::AfterConcept => Level::Concept,
        }
    }

    /// Indicates whether this [`HookType`] fires after its [`Level`] runs.
    #[must_use]
    pub const fn is_after(self) -> bool {
        matches!(
            self,
            Self::AfterSuite
                | Self::AfterSpec
                | Self::AfterScenario
                | Self::AfterStep
                | Self::AfterConcept,
        )
    }

    /// Returns the [`Strategy`] ordering hooks of this [`HookType`].
    ///
    /// Suite hooks are [`Plain`]. Otherwise, generic setup runs before the
    /// specific one ([`UntaggedHooksFirst`]), and specific cleanup runs
    /// before the generic one ([`TaggedHooksFirst`]).
    #[must_use]
    pub fn strategy(self) -> &'static dyn Strategy {
        match (self.level(), self.is_after()) {
            (Level::Suite, _) => &Plain,
            (_, true) => &TaggedHooksFirst,
            (_, false) => &UntaggedHooksFirst,
        }
    }
}

/// Rule of matching hook tags against the requested ones.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
pub enum Aggregation {
    /// Every hook tag has to be requested.
    #[default]
    And,

    /// At least one hook tag has to be requested.
    Or,
}

/// Hook registered for some [`HookType`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HookMethod {
    /// [`HookType`] this hook is bound to.
    pub hook_type: HookType,

    /// [`Callable`] executing this hook.
    pub callable: Callable,

    /// Tags restricting this hook. Untagged hooks always apply.
    pub tags: Vec<String>,

    /// [`Aggregation`] of the [`tags`](HookMethod::tags).
    pub aggregation: Aggregation,
}

impl HookMethod {
    /// Creates a new untagged [`HookMethod`].
    #[must_use]
    pub const fn new(hook_type: HookType, callable: Callable) -> Self {
        Self {
            hook_type,
            callable,
            tags: Vec::new(),
            aggregation: Aggregation::And,
        }
    }

    /// Restricts this [`HookMethod`] to the given `tags`.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the [`Aggregation`] of the tags.
    #[must_use]
    pub const fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Returns the fully-qualified name of the hook.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.callable.name
    }

    /// Indicates whether this [`HookMethod`] has no tags.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }

    /// Indicates whether this [`HookMethod`] applies to the `requested`
    /// tags.
    #[must_use]
    pub fn is_applicable<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        let is_requested =
            |tag: &String| requested.iter().any(|r| r.as_ref() == tag);

        match self.aggregation {
            _ if self.is_untagged() => true,
            Aggregation::And => self.tags.iter().all(is_requested),
            Aggregation::Or => self.tags.iter().any(is_requested),
        }
    }
}
