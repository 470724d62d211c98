// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Orchestrator`] turning executions into [`ExecutionReport`]s.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use tracing::{debug, warn};

use crate::{
    context::ExecutionInfo,
    datastore::{DataStores, Scope},
    error::{panic_message, DataStoreError},
    executor::{HookExecutor, StepExecutor},
    hook::{self, HookType, Strategy},
    invoke::{InstanceManager, Invoker, ScreenshotWriter},
    result::{ExecutionReport, ExecutionResult},
    sink::Sinks,
    step::Method,
    StreamId,
};

/// Wraps [`StepExecutor`] and [`HookExecutor`] into timed
/// [`ExecutionReport`]s carrying everything user code wrote meanwhile.
pub struct Orchestrator {
    /// Executor of steps.
    steps: StepExecutor,

    /// Executor of hooks.
    hooks: HookExecutor,

    /// Lifecycle of user instances.
    instances: Arc<dyn InstanceManager>,

    /// Capturer of failure screenshots, if any.
    screenshots: Option<Arc<dyn ScreenshotWriter>>,

    /// Indicator whether a screenshot is captured on failure.
    screenshot_on_failure: bool,

    /// Data stores of all the streams.
    data_stores: DataStores,

    /// Pending messages and screenshots of all the streams.
    sinks: Sinks,
}

// Implemented manually, as trait objects are not `Debug`.
impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("hooks", &self.hooks)
            .field("screenshot_on_failure", &self.screenshot_on_failure)
            .field("data_stores", &self.data_stores)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates a new [`Orchestrator`] capturing no screenshots.
    #[must_use]
    pub fn new(
        invoker: Arc<dyn Invoker>,
        hooks: Arc<hook::Registry>,
        instances: Arc<dyn InstanceManager>,
    ) -> Self {
        Self {
            steps: StepExecutor::new(Arc::clone(&invoker)),
            hooks: HookExecutor::new(hooks, invoker),
            instances,
            screenshots: None,
            screenshot_on_failure: false,
            data_stores: DataStores::new(),
            sinks: Sinks::default(),
        }
    }

    /// Sets the [`ScreenshotWriter`] capturing screenshots on failure, if
    /// `enabled`.
    #[must_use]
    pub fn screenshots(
        mut self,
        writer: Option<Arc<dyn ScreenshotWriter>>,
        enabled: bool,
    ) -> Self {
        self.screenshots = writer;
        self.screenshot_on_failure = enabled;
        self
    }

    /// Returns the [`DataStores`] of all the streams.
    #[must_use]
    pub const fn data_stores(&self) -> &DataStores {
        &self.data_stores
    }

    /// Executes the step `method` with the given `args` on the `stream`.
    pub async fn execute_step(
        &self,
        method: &Method,
        stream: StreamId,
        args: &[String],
    ) -> ExecutionReport {
        let stores = self.data_stores.snapshot(stream);
        let sink = self.sinks.of(stream);

        let started = Instant::now();
        let result = self
            .steps
            .execute(method, stream, args, &stores, &sink)
            .await;
        self.report(result, started, stream)
    }

    /// Executes the hooks of the `hook_type` applicable to the `tags` on the
    /// `stream`.
    pub async fn execute_hooks(
        &self,
        hook_type: HookType,
        strategy: &dyn Strategy,
        tags: &[String],
        stream: StreamId,
        info: &ExecutionInfo,
    ) -> ExecutionReport {
        let stores = self.data_stores.snapshot(stream);
        let sink = self.sinks.of(stream);

        let started = Instant::now();
        let result = self
            .hooks
            .execute(hook_type, strategy, tags, stream, info, &stores, &sink)
            .await;
        self.report(result, started, stream)
    }

    /// (Re)creates the [`DataStore`] of the `scope` for the `stream`, letting
    /// the [`InstanceManager`] prepare it.
    ///
    /// # Errors
    ///
    /// If the preparation fails or panics.
    ///
    /// [`DataStore`]: crate::DataStore
    pub fn init_data_store(
        &self,
        scope: Scope,
        stream: StreamId,
    ) -> Result<(), DataStoreError> {
        debug!(%scope, %stream, "initializing data store");
        self.data_stores.initialize(scope, stream, |store| {
            self.instances.init_data_store(scope, store)
        })
    }

    /// Drops all the cached user instances.
    pub fn clear_cache(&self) {
        debug!("clearing instance cache");
        self.instances.clear_cache();
    }

    /// Opens a new instance scope identified by the `tag`.
    pub fn start_execution_scope(&self, tag: &str) {
        self.instances.start_scope(tag);
    }

    /// Closes the innermost instance scope.
    pub fn close_execution_scope(&self) {
        self.instances.close_scope();
    }

    /// Takes all the messages written on the `stream` so far.
    #[must_use]
    pub fn pending_messages(&self, stream: StreamId) -> Vec<String> {
        self.sinks.of(stream).drain_messages()
    }

    /// Takes all the screenshot files captured on the `stream` so far.
    #[must_use]
    pub fn pending_screenshot_files(&self, stream: StreamId) -> Vec<String> {
        self.sinks.of(stream).drain_screenshot_files()
    }

    /// Builds the [`ExecutionReport`] of the `result`, draining the pending
    /// output of the `stream` into it.
    fn report(
        &self,
        result: ExecutionResult,
        started: Instant,
        stream: StreamId,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::new(result, started.elapsed());
        if report.failed {
            report.failure_screenshot_file = self.failure_screenshot(stream);
        }
        report.messages = self.pending_messages(stream);
        report.screenshot_files = self.pending_screenshot_files(stream);
        report
    }

    /// Captures a screenshot of a failure, if enabled.
    ///
    /// Never fails: capturing errors are logged and swallowed.
    fn failure_screenshot(&self, stream: StreamId) -> Option<String> {
        if !self.screenshot_on_failure {
            return None;
        }
        let writer = self.screenshots.as_ref()?;
        let stores = self.data_stores.snapshot(stream);

        match panic::catch_unwind(AssertUnwindSafe(|| {
            writer.take_screenshot(&stores)
        })) {
            Ok(Ok(file)) => Some(file),
            Ok(Err(e)) => {
                warn!(%stream, error = %e, "failure screenshot not captured");
                None
            }
            Err(payload) => {
                warn!(
                    %stream,
                    error = %panic_message(payload.as_ref()),
                    "failure screenshot capturing panicked",
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::executor::block_on;

    use super::*;
    use crate::{
        datastore::{DataStore, Stores},
        error::ScreenshotError,
        hook::HookMethod,
        invoke::{Callable, FnInvoker, InvocationError},
    };

    #[derive(Default)]
    struct Instances(Mutex<Vec<String>>);

    impl InstanceManager for Instances {
        fn start_scope(&self, tag: &str) {
            self.0.lock().unwrap().push(format!("start {tag}"));
        }

        fn clear_cache(&self) {
            self.0.lock().unwrap().push("clear".into());
        }

        fn close_scope(&self) {
            self.0.lock().unwrap().push("close".into());
        }

        fn init_data_store(
            &self,
            scope: Scope,
            store: &DataStore,
        ) -> Result<(), InvocationError> {
            self.0.lock().unwrap().push(format!("init {scope}"));
            match scope {
                Scope::Suite => Err(InvocationError::new("Exception", "no suite")),
                Scope::Spec | Scope::Scenario => {
                    store.add("seeded", true);
                    Ok(())
                }
            }
        }
    }

    struct Camera(Result<&'static str, &'static str>);

    impl ScreenshotWriter for Camera {
        fn take_screenshot(&self, stores: &Stores) -> Result<String, ScreenshotError> {
            assert!(stores.scenario.is_some(), "sees stream stores");
            self.0.map(str::to_owned).map_err(ScreenshotError::new)
        }
    }

    struct PanickingCamera;

    impl ScreenshotWriter for PanickingCamera {
        fn take_screenshot(&self, _: &Stores) -> Result<String, ScreenshotError> {
            panic!("no display")
        }
    }

    fn step(name: &str) -> Method {
        Method::new(Callable::new("Steps", name), name)
    }

    fn orchestrator(invoker: FnInvoker) -> Orchestrator {
        Orchestrator::new(
            Arc::new(invoker),
            Arc::new(hook::Registry::new()),
            Arc::new(()),
        )
    }

    fn failing(method: &Method) -> FnInvoker {
        FnInvoker::new().with(&method.callable, |call| {
            call.sink.write_message("about to fail");
            Err(InvocationError::new("Exception", "failed"))
        })
    }

    #[test]
    fn drains_output_on_success() {
        let method = step("Writes");
        let invoker = FnInvoker::new().with(&method.callable, |call| {
            call.sink.write_message("hello");
            call.sink.add_screenshot_file("shot.png");
            Ok(())
        });
        let orchestrator = orchestrator(invoker);

        let report =
            block_on(orchestrator.execute_step(&method, StreamId::DEFAULT, &[]));

        assert!(!report.failed);
        assert_eq!(report.messages, ["hello"]);
        assert_eq!(report.screenshot_files, ["shot.png"]);
        assert!(orchestrator.pending_messages(StreamId::DEFAULT).is_empty());
    }

    #[test]
    fn drains_output_on_failure() {
        let method = step("Fails");
        let orchestrator = orchestrator(failing(&method));

        let report =
            block_on(orchestrator.execute_step(&method, StreamId::DEFAULT, &[]));

        assert!(report.failed);
        assert_eq!(report.error_message.as_deref(), Some("failed"));
        assert_eq!(report.messages, ["about to fail"]);
        assert_eq!(report.failure_screenshot_file, None);
    }

    #[test]
    fn output_is_per_stream() {
        let method = step("Writes");
        let invoker = FnInvoker::new().with(&method.callable, |call| {
            call.sink.write_message(format!("from {}", call.stream));
            Ok(())
        });
        let orchestrator = orchestrator(invoker);

        let first = block_on(orchestrator.execute_step(&method, StreamId(1), &[]));
        let second = block_on(orchestrator.execute_step(&method, StreamId(2), &[]));

        assert_eq!(first.messages, ["from 1"]);
        assert_eq!(second.messages, ["from 2"]);
    }

    #[test]
    fn captures_failure_screenshot() {
        let method = step("Fails");
        let orchestrator = orchestrator(failing(&method))
            .screenshots(Some(Arc::new(Camera(Ok("failure.png")))), true);
        orchestrator
            .init_data_store(Scope::Scenario, StreamId::DEFAULT)
            .unwrap();

        let report =
            block_on(orchestrator.execute_step(&method, StreamId::DEFAULT, &[]));

        assert_eq!(report.failure_screenshot_file.as_deref(), Some("failure.png"));
    }

    #[test]
    fn screenshot_policy_is_respected() {
        let method = step("Fails");
        let orchestrator = orchestrator(failing(&method))
            .screenshots(Some(Arc::new(Camera(Ok("failure.png")))), false);

        let report =
            block_on(orchestrator.execute_step(&method, StreamId::DEFAULT, &[]));

        assert!(report.failed);
        assert_eq!(report.failure_screenshot_file, None);
    }

    #[test]
    fn screenshot_failures_are_swallowed() {
        let method = step("Fails");
        for writer in [
            Arc::new(Camera(Err("no display"))) as Arc<dyn ScreenshotWriter>,
            Arc::new(PanickingCamera),
        ] {
            let orchestrator =
                orchestrator(failing(&method)).screenshots(Some(writer), true);
            orchestrator
                .init_data_store(Scope::Scenario, StreamId::DEFAULT)
                .unwrap();

            let report = block_on(orchestrator.execute_step(
                &method,
                StreamId::DEFAULT,
                &[],
            ));

            assert!(report.failed);
            assert!(!report.recoverable_error);
            assert_eq!(report.error_message.as_deref(), Some("failed"));
            assert_eq!(report.failure_screenshot_file, None);
        }
    }

    #[test]
    fn hooks_see_stream_stores() {
        let before = HookMethod::new(
            HookType::BeforeScenario,
            Callable::new("Hooks", "Count"),
        );
        let invoker = FnInvoker::new().with(&before.callable, |call| {
            let store = call.stores.scenario.as_ref().ok_or_else(|| {
                InvocationError::new("Exception", "no scenario store")
            })?;
            store.add("visits", 1_u32);
            Ok(())
        });
        let orchestrator = Orchestrator::new(
            Arc::new(invoker),
            Arc::new(hook::Registry::new().hook(before)),
            Arc::new(()),
        );
        orchestrator
            .init_data_store(Scope::Scenario, StreamId::DEFAULT)
            .unwrap();

        let report = block_on(orchestrator.execute_hooks(
            HookType::BeforeScenario,
            HookType::BeforeScenario.strategy(),
            &[],
            StreamId::DEFAULT,
            &ExecutionInfo::default(),
        ));

        assert!(!report.failed, "{report:?}");
        let store = orchestrator
            .data_stores()
            .scenario(StreamId::DEFAULT)
            .unwrap();
        assert_eq!(store.get::<u32>("visits").as_deref(), Some(&1));
    }

    #[test]
    fn forwards_instance_lifecycle() {
        let instances = Arc::new(Instances::default());
        let orchestrator = Orchestrator::new(
            Arc::new(FnInvoker::new()),
            Arc::new(hook::Registry::new()),
            Arc::clone(&instances) as Arc<dyn InstanceManager>,
        );

        orchestrator.start_execution_scope("scenario");
        orchestrator.clear_cache();
        orchestrator.close_execution_scope();

        assert_eq!(
            *instances.0.lock().unwrap(),
            ["start scenario", "clear", "close"],
        );
    }

    #[test]
    fn data_stores_are_prepared_by_instances() {
        let instances = Arc::new(Instances::default());
        let orchestrator = Orchestrator::new(
            Arc::new(FnInvoker::new()),
            Arc::new(hook::Registry::new()),
            Arc::clone(&instances) as Arc<dyn InstanceManager>,
        );

        orchestrator.init_data_store(Scope::Spec, StreamId(2)).unwrap();
        let err = orchestrator
            .init_data_store(Scope::Suite, StreamId(2))
            .unwrap_err();

        let spec = orchestrator.data_stores().spec(StreamId(2)).unwrap();
        assert_eq!(spec.get::<bool>("seeded").as_deref(), Some(&true));
        assert_eq!(err.message, "Exception: no suite");
        assert_eq!(*instances.0.lock().unwrap(), ["init spec", "init suite"]);
    }
}
