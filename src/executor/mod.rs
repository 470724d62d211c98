// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Executors of single steps and of the hooks of a lifecycle event.
//!
//! - `step`: [`StepExecutor`] running a step implementation
//! - `hook`: [`HookExecutor`] running all the applicable hooks in order

mod hook;
mod step;

use std::panic::AssertUnwindSafe;

use futures::FutureExt as _;

use crate::invoke::{Call, InvocationError, Invoker};

pub use self::{hook::HookExecutor, step::StepExecutor};

/// Invokes the [`Call`], turning a panic of user code into an
/// [`InvocationError`].
async fn invoke_catching(
    invoker: &dyn Invoker,
    call: Call<'_>,
) -> Result<(), InvocationError> {
    AssertUnwindSafe(invoker.invoke(call))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(InvocationError::from_panic(payload.as_ref())))
}
