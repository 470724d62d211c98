// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Boundary between the execution core and the user code it runs.
//!
//! Steps and hooks are represented by opaque [`Callable`] handles, which an
//! [`Invoker`] dispatches to the actual implementation. The core never knows
//! how that happens.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use derive_more::with_trait::{Display, Error};

use crate::{
    context::ExecutionContext,
    datastore::{DataStore, Scope, Stores},
    error::ScreenshotError,
    sink::Sink,
    table::Argument,
    StreamId,
};

/// Opaque identifier of a user callable.
#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
pub struct CallableHandle(pub u64);

impl CallableHandle {
    /// Creates a new unique [`CallableHandle`].
    #[must_use]
    pub fn next() -> Self {
        /// [`AtomicU64`] ID.
        static ID: AtomicU64 = AtomicU64::new(0);

        Self(ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// User callable a step or a hook is bound to.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Callable {
    /// Handle the [`Invoker`] dispatches on.
    pub handle: CallableHandle,

    /// Fully-qualified name, used for deterministic ordering.
    pub name: String,

    /// Name of the type declaring this callable.
    pub declaring_type: String,
}

impl Callable {
    /// Creates a new [`Callable`] with a fresh [`CallableHandle`].
    #[must_use]
    pub fn new(declaring_type: impl Into<String>, method: &str) -> Self {
        let declaring_type = declaring_type.into();
        Self {
            handle: CallableHandle::next(),
            name: format!("{declaring_type}.{method}"),
            declaring_type,
        }
    }
}

/// Single invocation of a [`Callable`].
#[derive(Clone, Copy, Debug)]
pub struct Call<'a> {
    /// [`Callable`] to invoke.
    pub callable: &'a Callable,

    /// Stream the invocation happens on.
    pub stream: StreamId,

    /// Step arguments. Empty for hooks.
    pub arguments: &'a [Argument],

    /// [`ExecutionContext`] handed to hooks. [`None`] for steps.
    pub context: Option<&'a ExecutionContext>,

    /// Data stores of the [`stream`](Call::stream).
    pub stores: &'a Stores,

    /// [`Sink`] collecting messages and screenshots written by user code.
    pub sink: &'a Sink,
}

/// Capability of running a [`Callable`].
///
/// Implementations resolve the instance the callable belongs to and marshal
/// the arguments. The returned [`Future`] is awaited before any other work of
/// the same stream proceeds.
///
/// [`Future`]: std::future::Future
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invokes the [`Callable`] of the given [`Call`].
    ///
    /// # Errors
    ///
    /// With an [`InvocationError`] describing whatever the user code raised.
    async fn invoke(&self, call: Call<'_>) -> Result<(), InvocationError>;
}

/// Lifecycle of the user instances steps and hooks are invoked on.
pub trait InstanceManager: Send + Sync {
    /// Opens a new instance scope identified by the given `tag`.
    fn start_scope(&self, tag: &str);

    /// Drops all the cached instances.
    fn clear_cache(&self);

    /// Closes the innermost instance scope.
    fn close_scope(&self);

    /// Prepares the freshly created [`DataStore`] of the `scope`.
    ///
    /// Does nothing by default.
    ///
    /// # Errors
    ///
    /// With an [`InvocationError`] describing whatever the user code raised.
    fn init_data_store(
        &self,
        _scope: Scope,
        _store: &DataStore,
    ) -> Result<(), InvocationError> {
        Ok(())
    }
}

impl InstanceManager for () {
    fn start_scope(&self, _: &str) {}

    fn clear_cache(&self) {}

    fn close_scope(&self) {}
}

/// User-provided screenshot capturing.
pub trait ScreenshotWriter: Send + Sync {
    /// Captures a screenshot, returning the name of the written file.
    ///
    /// # Errors
    ///
    /// If the screenshot cannot be captured or written.
    fn take_screenshot(&self, stores: &Stores)
        -> Result<String, ScreenshotError>;
}

/// Names recognized as a "skip scenario" signal, no matter where the
/// raising code was compiled.
const SKIP_SCENARIO_SIGNALS: &[&str] = &["SkipScenario"];

/// Error raised by user code during an invocation.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display("{type_name}: {message}")]
pub struct InvocationError {
    /// Name of the raised error type.
    #[error(not(source))]
    pub type_name: String,

    /// Error message.
    pub message: String,

    /// Rendered stack trace.
    pub stack_trace: String,

    /// Module or assembly the error originates from.
    pub origin: String,

    /// Error this one wraps, if any.
    pub inner: Option<Box<InvocationError>>,

    /// Causes of an aggregate error.
    pub causes: Vec<InvocationError>,
}

impl InvocationError {
    /// Creates a new [`InvocationError`].
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: String::new(),
            origin: String::new(),
            inner: None,
            causes: Vec::new(),
        }
    }

    /// Creates an aggregate [`InvocationError`] of several `causes`.
    #[must_use]
    pub fn aggregate(
        message: impl Into<String>,
        causes: impl IntoIterator<Item = Self>,
    ) -> Self {
        Self {
            causes: causes.into_iter().collect(),
            ..Self::new("AggregateException", message)
        }
    }

    /// Creates an [`InvocationError`] out of a panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::new("panic", crate::error::panic_message(payload))
    }

    /// Sets the stack trace.
    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = stack_trace.into();
        self
    }

    /// Sets the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Wraps the given `inner` error.
    #[must_use]
    pub fn caused_by(mut self, inner: Self) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Returns the innermost wrapped error.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut err = self;
        while let Some(inner) = &err.inner {
            err = inner;
        }
        err
    }

    /// Indicates whether this error is an aggregate of several causes.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        !self.causes.is_empty()
    }

    /// Indicates whether this error signals skipping the current scenario.
    ///
    /// Recognized by the simple name of the error type only.
    #[must_use]
    pub fn is_skip_scenario(&self) -> bool {
        let simple = self
            .type_name
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(&self.type_name);
        SKIP_SCENARIO_SIGNALS.iter().any(|s| simple.contains(s))
    }

    /// Renders this error together with all its causes.
    #[must_use]
    pub fn full_text(&self) -> String {
        let mut out = self.to_string();
        for (n, cause) in self.causes.iter().enumerate() {
            out.push_str(&format!("\n ---> ({n}) {}", cause.full_text()));
        }
        if let Some(inner) = &self.inner {
            out.push_str(&format!("\n ---> {}", inner.full_text()));
        }
        out
    }
}

/// Body of a [`Callable`] run by a [`FnInvoker`].
pub type Body =
    Arc<dyn Fn(&Call<'_>) -> Result<(), InvocationError> + Send + Sync>;

/// [`Invoker`] dispatching [`Callable`]s to in-process closures.
#[derive(Clone, Default)]
pub struct FnInvoker {
    /// Registered bodies.
    bodies: HashMap<CallableHandle, Body>,
}

// Implemented manually, as closures are not `Debug`.
impl fmt::Debug for FnInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInvoker")
            .field("bodies", &self.bodies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FnInvoker {
    /// Creates a new empty [`FnInvoker`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the given `body` to the [`Callable`].
    #[must_use]
    pub fn with<F>(mut self, callable: &Callable, body: F) -> Self
    where
        F: Fn(&Call<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        _ = self.bodies.insert(callable.handle, Arc::new(body));
        self
    }
}

#[async_trait]
impl Invoker for FnInvoker {
    async fn invoke(&self, call: Call<'_>) -> Result<(), InvocationError> {
        let body = self.bodies.get(&call.callable.handle).ok_or_else(|| {
            InvocationError::new(
                "MissingMethodException",
                format!("No body bound to `{}`", call.callable.name),
            )
        })?;
        body(&call)
    }
}
