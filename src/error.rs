// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types of the execution core.
//!
//! None of these cross the [`Runner`] boundary: every host-facing operation
//! turns them into a structured report.
//!
//! [`Runner`]: crate::Runner

use derive_more::with_trait::{Display, Error};

use crate::{datastore::Scope, StreamId};

/// Errors of looking up step implementations in a [`step::Registry`].
///
/// [`step::Registry`]: crate::step::Registry
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum RegistryError {
    /// No implementation is registered for the step value.
    #[display("Step implementation not found: {step_value}")]
    NotFound {
        /// Step value being looked up.
        #[error(not(source))]
        step_value: String,
    },

    /// More than one implementation is registered for the step value, while
    /// a unique one is required.
    #[display("Multiple step implementations found for: {step_value}")]
    Duplicate {
        /// Step value being looked up.
        #[error(not(source))]
        step_value: String,

        /// Number of registered implementations.
        count: usize,
    },
}

impl RegistryError {
    /// Creates a new [`RegistryError::NotFound`].
    #[must_use]
    pub fn not_found(step_value: impl Into<String>) -> Self {
        Self::NotFound { step_value: step_value.into() }
    }

    /// Creates a new [`RegistryError::Duplicate`].
    #[must_use]
    pub fn duplicate(step_value: impl Into<String>, count: usize) -> Self {
        Self::Duplicate { step_value: step_value.into(), count }
    }
}

/// Errors of submitting work to a [`Scheduler`].
///
/// [`Scheduler`]: crate::Scheduler
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum SchedulerError {
    /// [`Scheduler`] has been disposed and accepts no more work.
    ///
    /// [`Scheduler`]: crate::Scheduler
    #[display("Scheduler is disposed, stream {stream} accepts no more work")]
    Disposed {
        /// Stream the work was submitted to.
        #[error(not(source))]
        stream: StreamId,
    },

    /// Work item panicked.
    #[display("Work item panicked: {message}")]
    Panicked {
        /// Rendered panic payload.
        #[error(not(source))]
        message: String,
    },
}

/// Error of initializing a [`DataStore`].
///
/// [`DataStore`]: crate::DataStore
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
#[display("Failed to initialize {scope} data store of stream {stream}: {message}")]
pub struct DataStoreError {
    /// [`Scope`] of the [`DataStore`].
    ///
    /// [`DataStore`]: crate::DataStore
    #[error(not(source))]
    pub scope: Scope,

    /// Stream the [`DataStore`] belongs to.
    ///
    /// [`DataStore`]: crate::DataStore
    pub stream: StreamId,

    /// Rendered failure.
    pub message: String,
}

/// Error of capturing a screenshot.
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
#[display("Failed to capture screenshot: {message}")]
pub struct ScreenshotError {
    /// Rendered failure.
    #[error(not(source))]
    pub message: String,
}

impl ScreenshotError {
    /// Creates a new [`ScreenshotError`].
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Errors of reading a [`Config`].
///
/// [`Config`]: crate::Config
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// Unknown state clear level.
    #[display(
        "Unknown state clear level `{value}`, expected one of: \
         suite, spec, scenario"
    )]
    UnknownClearStateLevel {
        /// Value being parsed.
        #[error(not(source))]
        value: String,
    },

    /// Environment or arguments could not be parsed.
    #[display("Invalid runner configuration: {_0}")]
    Invalid(clap::Error),
}

/// Renders a panic payload into a human-readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_owned()))
        .unwrap_or_else(|| "Unknown panic payload".to_owned())
}
