// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution core of a [Gauge] language runner.
//!
//! A [`Runner`] receives the requests of a Gauge host: step executions,
//! lifecycle events running hooks, data store initializations and discovery
//! queries. Execution requests are serialized per stream by a [`Scheduler`],
//! hooks are selected by their tags, and every outcome is reported back as a
//! structured [`ExecutionReport`], never as an error.
//!
//! User code is reached only through the [`Invoker`] trait, so the core knows
//! nothing about how steps and hooks are actually implemented.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use futures::executor::block_on;
//! use gauge_runner::{
//!     step, Callable, ExecuteStepRequest, FnInvoker, Method, Parameter, Runner,
//! };
//!
//! let say = Method::new(Callable::new("Steps", "Say"), "Say <what> to <whom>");
//! let invoker = FnInvoker::new().with(&say.callable, |call| {
//!     let arg = |i: usize| call.arguments[i].as_text().unwrap_or_default();
//!     call.sink.write_message(format!("{}, {}!", arg(0), arg(1)));
//!     Ok(())
//! });
//! let runner = Runner::builder(Arc::new(invoker))
//!     .steps(step::Registry::new().step(say))
//!     .build();
//!
//! let report = block_on(runner.execute_step(ExecuteStepRequest {
//!     parsed_step_text: "Say {} to {}".into(),
//!     parameters: vec![Parameter::text("hello"), Parameter::text("world")],
//!     ..ExecuteStepRequest::default()
//! }));
//!
//! assert!(!report.failed);
//! assert_eq!(report.messages, ["hello, world!"]);
//! ```
//!
//! [Gauge]: https://gauge.org

#![deny(nonstandard_style, rustdoc::broken_intra_doc_links)]
#![forbid(non_ascii_idents, unsafe_code)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    missing_docs
)]

pub mod config;
pub mod context;
pub mod datastore;
pub mod error;
pub mod executor;
pub mod hook;
pub mod invoke;
pub mod logging;
pub mod orchestrator;
pub mod result;
pub mod runner;
pub mod scheduler;
pub mod sink;
pub mod step;
pub mod table;

#[doc(inline)]
pub use self::{
    config::{ClearStateLevel, Config},
    context::{ExecutionContext, ExecutionInfo},
    datastore::{DataStore, Scope},
    hook::{HookMethod, HookType},
    invoke::{
        Call, Callable, FnInvoker, InstanceManager, InvocationError, Invoker,
        ScreenshotWriter,
    },
    orchestrator::Orchestrator,
    result::{ExecutionReport, InitReport},
    runner::{
        ExecuteStepRequest, FileStatus, LifecycleRequest, Parameter, Runner,
        Validation,
    },
    scheduler::{Scheduler, StreamId},
    sink::Sink,
    step::{Method, StepValue},
    table::{Argument, Table},
};
