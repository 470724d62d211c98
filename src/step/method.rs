// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Metadata of a step implementation, as produced by implementation
//! discovery.

use derive_more::with_trait::Display;

use crate::invoke::Callable;

use super::StepValue;

/// Position of a step implementation inside its source file.
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[display("{start}:{start_char}-{end}:{end_char}")]
pub struct SourceSpan {
    /// Line the implementation starts at.
    pub start: u32,

    /// Column the implementation starts at.
    pub start_char: u32,

    /// Line the implementation ends at.
    pub end: u32,

    /// Column the implementation ends at.
    pub end_char: u32,
}

impl SourceSpan {
    /// Creates a new [`SourceSpan`].
    #[must_use]
    pub const fn new(
        start: u32,
        start_char: u32,
        end: u32,
        end_char: u32,
    ) -> Self {
        Self { start, start_char, end, end_char }
    }
}

/// Step implementation registered in a [`Registry`].
///
/// Never mutated by the execution core once registered.
///
/// [`Registry`]: super::Registry
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Method {
    /// [`Callable`] executing this step.
    pub callable: Callable,

    /// Number of parameters the implementation declares.
    pub parameter_count: usize,

    /// Literal step text, as written in the implementation.
    pub step_text: String,

    /// Parameter-erased [`step_text`](Method::step_text).
    pub step_value: String,

    /// Indicator whether this implementation is bound to several step texts.
    pub is_alias: bool,

    /// All the step texts this implementation is bound to.
    pub aliases: Vec<String>,

    /// Indicator whether a failure of this step is recoverable.
    pub continue_on_failure: bool,

    /// Source file declaring this implementation, if known.
    pub file_name: Option<String>,

    /// [`SourceSpan`] inside the [`file_name`](Method::file_name).
    pub span: Option<SourceSpan>,
}

impl Method {
    /// Creates a new [`Method`] for the given `step_text`, deriving its step
    /// value and parameter count from the text.
    #[must_use]
    pub fn new(callable: Callable, step_text: impl Into<String>) -> Self {
        let step_text = step_text.into();
        let value = StepValue::parse(&step_text);

        Self {
            callable,
            parameter_count: value.parameter_count(),
            step_value: value.into(),
            aliases: vec![step_text.clone()],
            step_text,
            is_alias: false,
            continue_on_failure: false,
            file_name: None,
            span: None,
        }
    }

    /// Binds this [`Method`] to the given alias step texts, in addition to
    /// its own one.
    #[must_use]
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self.is_alias = self.aliases.len() > 1;
        self
    }

    /// Marks failures of this [`Method`] as recoverable.
    #[must_use]
    pub const fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    /// Sets the source location of this [`Method`].
    #[must_use]
    pub fn located(
        mut self,
        file_name: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        self.file_name = Some(file_name.into());
        self.span = Some(span);
        self
    }

    /// Returns the fully-qualified name of the implementation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.callable.name
    }

    /// Returns one [`Method`] per alias, each keyed by that alias' step value.
    ///
    /// A [`Method`] without aliases yields only itself.
    pub fn per_alias(&self) -> impl Iterator<Item = Self> + '_ {
        self.aliases.iter().map(|text| {
            let value = StepValue::parse(text);
            Self {
                step_text: text.clone(),
                step_value: value.into(),
                ..self.clone()
            }
        })
    }
}
