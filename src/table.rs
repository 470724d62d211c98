// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step arguments, including tabular ones.
//!
//! Tables travel to the execution core as JSON-encoded strings, and are
//! decoded back on a best-effort basis right before invoking a step.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Table passed as a step argument.
///
/// # Example
///
/// ```rust
/// use gauge_runner::Table;
///
/// let table = Table::new(
///     vec!["name".into(), "age".into()],
///     vec![
///         vec!["Alice".into(), "30".into()],
///         vec!["Bob".into(), "25".into()],
///     ],
/// );
///
/// assert_eq!(table.column("age"), Some(vec!["30", "25"]));
/// assert_eq!(table.hashes()[1].get("name").map(String::as_str), Some("Bob"));
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Table {
    /// Header cells.
    headers: Vec<String>,

    /// Rows below the header.
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a new [`Table`].
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Returns the header cells.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns the rows below the header.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Returns the cells of the column under the given `header`.
    #[must_use]
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == header)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map_or("", String::as_str))
                .collect(),
        )
    }

    /// Converts every row into a map keyed by the headers.
    #[must_use]
    pub fn hashes(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers.iter().cloned().zip(row.iter().cloned()).collect()
            })
            .collect()
    }

    /// Encodes this [`Table`] into its wire form.
    ///
    /// # Errors
    ///
    /// If serialization fails.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Argument a step implementation is invoked with.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Argument {
    /// Plain text argument.
    Text(String),

    /// Tabular argument.
    Table(Table),
}

impl Argument {
    /// Decodes the given raw argument.
    ///
    /// Anything which is not an encoded [`Table`] is passed through as
    /// [`Argument::Text`] unchanged.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str::<Table>(raw)
            .map_or_else(|_| Self::Text(raw.to_owned()), Self::Table)
    }

    /// Returns the text of an [`Argument::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Table(_) => None,
        }
    }

    /// Returns the [`Table`] of an [`Argument::Table`].
    #[must_use]
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            Self::Text(_) => None,
        }
    }
}
