// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution of a single step implementation.

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    datastore::Stores,
    invoke::{Call, Invoker},
    result::{ExecutionResult, Outcome},
    sink::Sink,
    step::Method,
    table::Argument,
    StreamId,
};

use super::invoke_catching;

/// Runs step implementations through an [`Invoker`].
#[derive(Clone)]
pub struct StepExecutor {
    /// [`Invoker`] dispatching to user code.
    invoker: Arc<dyn Invoker>,
}

// Implemented manually, as `dyn Invoker` is not `Debug`.
impl fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepExecutor").finish_non_exhaustive()
    }
}

impl StepExecutor {
    /// Creates a new [`StepExecutor`].
    #[must_use]
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker }
    }

    /// Executes the `method` with the given raw `args`.
    ///
    /// Every argument being an encoded table is decoded into
    /// [`Argument::Table`], the rest are passed as is.
    pub async fn execute(
        &self,
        method: &Method,
        stream: StreamId,
        args: &[String],
        stores: &Stores,
        sink: &Sink,
    ) -> ExecutionResult {
        let arguments =
            args.iter().map(|a| Argument::decode(a)).collect::<Vec<_>>();
        let call = Call {
            callable: &method.callable,
            stream,
            arguments: &arguments,
            context: None,
            stores,
            sink,
        };

        debug!(%stream, step = %method.step_text, "executing step");
        let outcome = Outcome::classify(
            invoke_catching(self.invoker.as_ref(), call).await,
            method.continue_on_failure,
        );
        if let Outcome::Recoverable(d) | Outcome::Fatal(d) = &outcome {
            debug!(%stream, step = %method.step_text, error = %d.message, "step failed");
        }

        outcome.into()
    }
}
