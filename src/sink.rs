// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Diagnostics written by user code while being invoked.

use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Mutex, PoisonError},
};

use crate::StreamId;

/// Accumulator of messages and screenshot file names written by user code.
///
/// Clones share the same buffers. Drained exactly once per orchestrated
/// call.
#[derive(Clone, Debug, Default)]
pub struct Sink {
    /// Pending messages.
    messages: Arc<Mutex<Vec<String>>>,

    /// Pending screenshot file names.
    screenshot_files: Arc<Mutex<Vec<String>>>,
}

impl Sink {
    /// Creates a new empty [`Sink`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn write_message(&self, message: impl Into<String>) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.into());
    }

    /// Appends the name of a captured screenshot file.
    pub fn add_screenshot_file(&self, file: impl Into<String>) {
        self.screenshot_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(file.into());
    }

    /// Takes all the pending messages, leaving none.
    #[must_use]
    pub fn drain_messages(&self) -> Vec<String> {
        mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Takes all the pending screenshot file names, leaving none.
    #[must_use]
    pub fn drain_screenshot_files(&self) -> Vec<String> {
        mem::take(
            &mut *self
                .screenshot_files
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

/// [`Sink`]s by stream.
#[derive(Debug, Default)]
pub struct Sinks(Mutex<HashMap<StreamId, Sink>>);

impl Sinks {
    /// Returns the [`Sink`] of the stream, creating it on first use.
    #[must_use]
    pub fn of(&self, stream: StreamId) -> Sink {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(stream)
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_once() {
        let sink = Sink::new();
        sink.write_message("hello");
        sink.clone().write_message("world");
        sink.add_screenshot_file("shot.png");

        assert_eq!(sink.drain_messages(), ["hello", "world"]);
        assert!(sink.drain_messages().is_empty());
        assert_eq!(sink.drain_screenshot_files(), ["shot.png"]);
        assert!(sink.drain_screenshot_files().is_empty());
    }

    #[test]
    fn sinks_are_per_stream() {
        let sinks = Sinks::default();
        sinks.of(StreamId(1)).write_message("one");
        sinks.of(StreamId(2)).write_message("two");

        assert_eq!(sinks.of(StreamId(1)).drain_messages(), ["one"]);
        assert_eq!(sinks.of(StreamId(2)).drain_messages(), ["two"]);
    }
}
