// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Installation of the global [`tracing`] subscriber.
//!
//! Standard output belongs to the host protocol, so everything is logged to
//! standard error.

use std::io;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt as _,
    util::{SubscriberInitExt as _, TryInitError},
    Layer as _,
};

/// Initializes the global [`Subscriber`] logging up to the given `level`.
///
/// # Errors
///
/// If a global [`Subscriber`] has been set already.
///
/// [`Subscriber`]: tracing::Subscriber
pub fn init(level: LevelFilter) -> Result<(), TryInitError> {
    let layer = fmt::layer().with_writer(io::stderr).with_target(false);
    tracing_subscriber::registry()
        .with(level.and_then(layer))
        .try_init()
}
