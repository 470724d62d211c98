// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution of all the hooks applicable to a lifecycle event.

use std::{fmt, ops::ControlFlow, sync::Arc};

use tracing::{debug, trace};

use crate::{
    context::{ExecutionContext, ExecutionInfo},
    datastore::Stores,
    hook::{self, HookType, Strategy},
    invoke::{Call, Invoker},
    result::{ExecutionResult, Outcome},
    sink::Sink,
    StreamId,
};

use super::invoke_catching;

/// Runs the hooks of a [`HookType`] in the order its [`Strategy`] defines.
#[derive(Clone)]
pub struct HookExecutor {
    /// Registered hooks.
    registry: Arc<hook::Registry>,

    /// [`Invoker`] dispatching to user code.
    invoker: Arc<dyn Invoker>,
}

// Implemented manually, as `dyn Invoker` is not `Debug`.
impl fmt::Debug for HookExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookExecutor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl HookExecutor {
    /// Creates a new [`HookExecutor`].
    #[must_use]
    pub fn new(registry: Arc<hook::Registry>, invoker: Arc<dyn Invoker>) -> Self {
        Self { registry, invoker }
    }

    /// Executes the hooks of the `hook_type` applicable to the `tags`.
    ///
    /// Every hook gets a fresh [`ExecutionContext`]. A failing hook doesn't
    /// prevent the next ones from running, and the last failure is the one
    /// reported. A skip signal stops the remaining hooks of the event.
    #[expect(clippy::too_many_arguments, reason = "mirrors the host request")]
    pub async fn execute(
        &self,
        hook_type: HookType,
        strategy: &dyn Strategy,
        tags: &[String],
        stream: StreamId,
        info: &ExecutionInfo,
        stores: &Stores,
        sink: &Sink,
    ) -> ExecutionResult {
        let hooks =
            strategy.applicable_hooks(tags, self.registry.hooks(hook_type));
        debug!(%stream, %hook_type, count = hooks.len(), "executing hooks");

        let mut result = ExecutionResult::passed();
        for hook in hooks {
            trace!(%stream, hook = hook.name(), "executing hook");
            let context = ExecutionContext::new(info, stores.clone());
            let call = Call {
                callable: &hook.callable,
                stream,
                arguments: &[],
                context: Some(&context),
                stores,
                sink,
            };
            let outcome = Outcome::classify(
                invoke_catching(self.invoker.as_ref(), call).await,
                false,
            );
            if let ControlFlow::Break(()) = result.record(outcome) {
                debug!(%stream, hook = hook.name(), "hook asked to skip scenario");
                break;
            }
        }
        result
    }
}
