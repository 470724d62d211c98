// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Config`] of a [`Runner`], read from the environment the host spawns it
//! with.
//!
//! [`Runner`]: crate::Runner

use std::{ffi::OsString, str::FromStr, time::Duration};

use clap::{ArgAction, Parser};
use derive_more::with_trait::Display;
use smart_default::SmartDefault;
use tracing::level_filters::LevelFilter;

use crate::{error::ConfigError, hook::Level};

/// Configuration of a [`Runner`].
///
/// Every option may be set either by its environment variable or as a
/// command-line argument.
///
/// [`Runner`]: crate::Runner
#[derive(Clone, Debug, Parser, SmartDefault)]
#[command(name = "gauge-runner", no_binary_name = true)]
pub struct Config {
    /// Capture a screenshot whenever a step or a hook fails.
    #[arg(
        long,
        env = "screenshot_on_failure",
        value_name = "bool",
        default_value_t = true,
        action = ArgAction::Set,
    )]
    #[default = true]
    pub screenshot_on_failure: bool,

    /// Level after which cached user instances are cleared.
    #[arg(
        long,
        env = "gauge_clear_state_level",
        value_name = "suite|spec|scenario"
    )]
    pub clear_state_level: Option<ClearStateLevel>,

    /// Execute streams concurrently, instead of queueing everything on the
    /// default one.
    #[arg(
        long,
        env = "enable_multithreading",
        value_name = "bool",
        default_value_t = false,
        action = ArgAction::Set,
    )]
    pub multithreaded: bool,

    /// Maximum level of log messages.
    #[arg(
        long,
        env = "GAUGE_LOG_LEVEL",
        value_name = "level",
        default_value = "info",
        value_parser = parse_log_level,
    )]
    #[default(LevelFilter::INFO)]
    pub log_level: LevelFilter,

    /// Delay between a kill request and signaling the host shutdown.
    ///
    /// Duration is represented in a human-readable format like `250ms`.
    #[arg(
        long,
        env = "GAUGE_KILL_GRACE",
        value_name = "duration",
        default_value = "100ms",
        value_parser = humantime::parse_duration,
    )]
    #[default(Duration::from_millis(100))]
    pub kill_grace: Duration,
}

impl Config {
    /// Reads the [`Config`] from the environment only.
    ///
    /// # Errors
    ///
    /// If any of the environment variables has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(std::iter::empty::<OsString>())
    }

    /// Reads the [`Config`] from the given arguments, falling back to the
    /// environment.
    ///
    /// # Errors
    ///
    /// If any of the values is invalid.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(ConfigError::Invalid)
    }

    /// Indicates whether user instances are cleared once the [`Level`] ends.
    #[must_use]
    pub fn clears_state_after(&self, level: Level) -> bool {
        self.clear_state_level.is_some_and(|l| l.level() == level)
    }
}

/// Level after which cached user instances are cleared.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ClearStateLevel {
    /// After the whole suite.
    #[display("suite")]
    Suite,

    /// After every specification.
    #[display("spec")]
    Spec,

    /// After every scenario.
    #[display("scenario")]
    Scenario,
}

impl ClearStateLevel {
    /// Returns the hook [`Level`] this [`ClearStateLevel`] corresponds to.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Suite => Level::Suite,
            Self::Spec => Level::Spec,
            Self::Scenario => Level::Scenario,
        }
    }
}

impl FromStr for ClearStateLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suite" => Ok(Self::Suite),
            "spec" => Ok(Self::Spec),
            "scenario" => Ok(Self::Scenario),
            _ => Err(ConfigError::UnknownClearStateLevel { value: s.to_owned() }),
        }
    }
}

/// Parses a log level, accepting `warning` as `warn`.
fn parse_log_level(s: &str) -> Result<LevelFilter, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "warning" => Ok(LevelFilter::WARN),
        other => LevelFilter::from_str(other).map_err(|e| e.to_string()),
    }
}
