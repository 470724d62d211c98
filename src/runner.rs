// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Runner`] serving the requests of a Gauge host.
//!
//! Every execution request is routed through the [`Scheduler`] as soon as
//! the corresponding method is called, so the requests of a single stream
//! are processed strictly in the order they were received, no matter in
//! which order the returned [`Future`]s are polled. Discovery requests
//! (validation, step names and positions) only read the step [`Registry`]
//! and are answered in place.
//!
//! [`Registry`]: step::Registry

use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread,
};

use futures::{
    channel::oneshot,
    future::{BoxFuture, Shared},
    FutureExt as _,
};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    context::ExecutionInfo,
    datastore::Scope,
    error::{RegistryError, SchedulerError},
    hook::{self, HookType},
    invoke::{InstanceManager, Invoker, ScreenshotWriter},
    orchestrator::Orchestrator,
    result::{ExecutionReport, InitReport},
    scheduler::Scheduler,
    step::{self, Method, SourceSpan, StepPosition},
    table::Table,
    StreamId,
};

/// Tag of the instance scope opened for every scenario.
pub const SCENARIO_SCOPE: &str = "scenario";

/// Kind of a step [`Parameter`], as reported by the host.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ParameterKind {
    /// Literal value written in the step.
    #[default]
    Static,

    /// Value taken from a data table or a concept argument.
    Dynamic,

    /// Value of a special parameter, like a file content.
    SpecialString,

    /// Table of a special parameter, like a CSV file.
    SpecialTable,

    /// Inline table.
    Table,
}

/// Actual argument of a step, as reported by the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Parameter {
    /// [`ParameterKind`] of this [`Parameter`].
    pub kind: ParameterKind,

    /// Name of this [`Parameter`], if any.
    pub name: String,

    /// Textual value.
    pub value: String,

    /// Tabular value, for table kinds.
    pub table: Option<Table>,
}

impl Parameter {
    /// Creates a new [`ParameterKind::Static`] [`Parameter`].
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self { value: value.into(), ..Self::default() }
    }

    /// Creates a new [`ParameterKind::Table`] [`Parameter`].
    #[must_use]
    pub fn table(table: Table) -> Self {
        Self {
            kind: ParameterKind::Table,
            table: Some(table),
            ..Self::default()
        }
    }

    /// Renders this [`Parameter`] into the raw argument passed to a step.
    ///
    /// Tables are passed encoded, to be decoded right before invocation.
    fn to_argument(&self) -> String {
        self.table
            .as_ref()
            .and_then(|t| t.encode().ok())
            .unwrap_or_else(|| self.value.clone())
    }
}

/// Request to execute a single step.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecuteStepRequest {
    /// Stream the step runs on.
    pub stream: StreamId,

    /// Step text as written in the specification.
    pub actual_step_text: String,

    /// Parameter-erased step text, looked up in the registry.
    pub parsed_step_text: String,

    /// Actual arguments.
    pub parameters: Vec<Parameter>,
}

/// Request notifying about a lifecycle event.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LifecycleRequest {
    /// Stream the event happens on.
    pub stream: StreamId,

    /// Lifecycle information about the current spec, scenario and step.
    pub info: ExecutionInfo,
}

/// Result of validating a step value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Validation {
    /// Exactly one implementation exists.
    Valid,

    /// No implementation exists.
    StepNotFound,

    /// Several implementations exist.
    DuplicateImplementation {
        /// Number of implementations.
        count: usize,
    },
}

/// Details of the implementation of a step value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StepName {
    /// Indicator whether the step is implemented at all.
    pub is_step_present: bool,

    /// All the step texts the implementation is bound to.
    pub step_texts: Vec<String>,

    /// Indicator whether the implementation has aliases.
    pub has_alias: bool,

    /// File the implementation is located in, if known.
    pub file_name: Option<String>,

    /// [`SourceSpan`] of the implementation, if known.
    pub span: Option<SourceSpan>,
}

/// Status of an implementation file, as reported by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileStatus {
    /// File is opened in an editor.
    Opened,

    /// File is closed in an editor.
    Closed,

    /// File has been created.
    Created,

    /// File contents changed.
    Changed,

    /// File has been deleted.
    Deleted,
}

/// [`Future`] resolving once the host has to be shut down.
pub type Shutdown = Shared<BoxFuture<'static, ()>>;

/// Builder of a [`Runner`].
pub struct Builder {
    /// [`Config`] of the [`Runner`].
    config: Config,

    /// [`Invoker`] dispatching to user code.
    invoker: Arc<dyn Invoker>,

    /// Registered step implementations.
    steps: step::Registry,

    /// Registered hooks.
    hooks: hook::Registry,

    /// Lifecycle of user instances.
    instances: Arc<dyn InstanceManager>,

    /// Capturer of failure screenshots.
    screenshots: Option<Arc<dyn ScreenshotWriter>>,
}

// Implemented manually, as trait objects are not `Debug`.
impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("steps", &self.steps)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Sets the [`Config`].
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the registered step implementations.
    #[must_use]
    pub fn steps(mut self, steps: step::Registry) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the registered hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: hook::Registry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the [`InstanceManager`] of user instances.
    #[must_use]
    pub fn instances(mut self, instances: Arc<dyn InstanceManager>) -> Self {
        self.instances = instances;
        self
    }

    /// Sets the [`ScreenshotWriter`] capturing failure screenshots.
    #[must_use]
    pub fn screenshot_writer(mut self, writer: Arc<dyn ScreenshotWriter>) -> Self {
        self.screenshots = Some(writer);
        self
    }

    /// Builds the [`Runner`].
    #[must_use]
    pub fn build(self) -> Runner {
        let orchestrator = Orchestrator::new(
            self.invoker,
            Arc::new(self.hooks),
            self.instances,
        )
        .screenshots(self.screenshots, self.config.screenshot_on_failure);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        Runner {
            scheduler: Scheduler::new(self.config.multithreaded),
            config: self.config,
            steps: Arc::new(RwLock::new(self.steps)),
            orchestrator: Arc::new(orchestrator),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown: shutdown_rx.map(drop).boxed().shared(),
        }
    }
}

/// Execution core of a Gauge language runner.
pub struct Runner {
    /// [`Config`] this [`Runner`] was built with.
    config: Config,

    /// Registered step implementations.
    steps: Arc<RwLock<step::Registry>>,

    /// [`Orchestrator`] of executions.
    orchestrator: Arc<Orchestrator>,

    /// [`Scheduler`] of executions by stream.
    scheduler: Scheduler,

    /// Sender signaling the host shutdown, until a kill is requested.
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,

    /// [`Shutdown`] signal.
    shutdown: Shutdown,
}

// Implemented manually, as `Shared` is not `Debug`.
impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Starts building a [`Runner`] invoking user code with the `invoker`.
    #[must_use]
    pub fn builder(invoker: Arc<dyn Invoker>) -> Builder {
        Builder {
            config: Config::default(),
            invoker,
            steps: step::Registry::new(),
            hooks: hook::Registry::new(),
            instances: Arc::new(()),
            screenshots: None,
        }
    }

    /// Returns the [`Config`] of this [`Runner`].
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a single step.
    ///
    /// Fails without invoking anything if the step isn't implemented, or if
    /// the number of arguments doesn't match the implementation.
    pub fn execute_step(
        &self,
        request: ExecuteStepRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        let steps = Arc::clone(&self.steps);
        let orchestrator = Arc::clone(&self.orchestrator);
        let stream = request.stream;

        self.schedule(stream, async move {
            let method = {
                let steps = steps.read().unwrap_or_else(PoisonError::into_inner);
                match steps.method_for(&request.parsed_step_text) {
                    Ok(m) => m.clone(),
                    Err(e) => {
                        debug!(%stream, error = %e, "step not found");
                        return ExecutionReport::error(
                            "Step Implementation not found",
                        );
                    }
                }
            };

            let args = request
                .parameters
                .iter()
                .map(Parameter::to_argument)
                .collect::<Vec<_>>();
            if method.parameter_count != args.len() {
                return ExecutionReport::error(format!(
                    "Argument length mismatch for {}. \
                     Actual Count: {}, Expected Count: {}",
                    request.actual_step_text,
                    args.len(),
                    method.parameter_count,
                ));
            }

            orchestrator.execute_step(&method, stream, &args).await
        })
    }

    /// Runs the [`HookType::BeforeSuite`] hooks.
    pub fn start_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::BeforeSuite, request)
    }

    /// Runs the [`HookType::AfterSuite`] hooks.
    pub fn finish_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::AfterSuite, request)
    }

    /// Runs the [`HookType::BeforeSpec`] hooks.
    pub fn start_spec_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::BeforeSpec, request)
    }

    /// Runs the [`HookType::AfterSpec`] hooks and closes the spec data store.
    pub fn finish_spec_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::AfterSpec, request)
    }

    /// Opens the scenario instance scope and runs the
    /// [`HookType::BeforeScenario`] hooks.
    pub fn start_scenario_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::BeforeScenario, request)
    }

    /// Runs the [`HookType::AfterScenario`] hooks, closes the scenario
    /// instance scope and data store.
    pub fn finish_scenario_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::AfterScenario, request)
    }

    /// Runs the [`HookType::BeforeStep`] hooks.
    pub fn start_step_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::BeforeStep, request)
    }

    /// Runs the [`HookType::AfterStep`] hooks.
    pub fn finish_step_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::AfterStep, request)
    }

    /// Runs the [`HookType::BeforeConcept`] hooks.
    pub fn start_concept_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::BeforeConcept, request)
    }

    /// Runs the [`HookType::AfterConcept`] hooks.
    pub fn finish_concept_execution(
        &self,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        self.run_hooks(HookType::AfterConcept, request)
    }

    /// (Re)creates the suite data store.
    pub fn init_suite_data_store(
        &self,
        stream: StreamId,
    ) -> impl Future<Output = InitReport> + Send + 'static {
        self.init_data_store(Scope::Suite, stream)
    }

    /// (Re)creates the spec data store of the `stream`.
    pub fn init_spec_data_store(
        &self,
        stream: StreamId,
    ) -> impl Future<Output = InitReport> + Send + 'static {
        self.init_data_store(Scope::Spec, stream)
    }

    /// (Re)creates the scenario data store of the `stream`.
    pub fn init_scenario_data_store(
        &self,
        stream: StreamId,
    ) -> impl Future<Output = InitReport> + Send + 'static {
        self.init_data_store(Scope::Scenario, stream)
    }

    /// Stops accepting any work and signals the [`Shutdown`] after the
    /// configured grace period.
    ///
    /// Resolves once the work already submitted completes.
    pub async fn kill(&self, stream: StreamId) {
        info!(%stream, "kill requested");
        self.scheduler.dispose().await;

        let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let grace = self.config.kill_grace;
        if let Err(e) = thread::Builder::new()
            .name("shutdown".into())
            .spawn(move || {
                thread::sleep(grace);
                _ = tx.send(());
            })
        {
            // The sender is dropped with the closure, which resolves the
            // `Shutdown` immediately.
            warn!(error = %e, "failed to delay shutdown");
        }
    }

    /// Returns the [`Shutdown`] signal, resolving after a [`Runner::kill()`].
    #[must_use]
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Validates the implementation of the `step_value`.
    #[must_use]
    pub fn validate_step(&self, step_value: &str) -> Validation {
        match self.steps().unique_method_for(step_value) {
            Ok(_) => Validation::Valid,
            Err(RegistryError::NotFound { .. }) => Validation::StepNotFound,
            Err(RegistryError::Duplicate { count, .. }) => {
                Validation::DuplicateImplementation { count }
            }
        }
    }

    /// Returns all the implemented step texts.
    #[must_use]
    pub fn step_names(&self) -> Vec<String> {
        self.steps().step_texts()
    }

    /// Returns details of the implementation of the `step_value`.
    #[must_use]
    pub fn step_name(&self, step_value: &str) -> StepName {
        let steps = self.steps();
        steps.method_for(step_value).map_or_else(
            |_| StepName::default(),
            |m| StepName {
                is_step_present: true,
                step_texts: m.aliases.clone(),
                has_alias: steps.has_alias(step_value),
                file_name: m.file_name.clone(),
                span: m.span,
            },
        )
    }

    /// Returns positions of the steps implemented in the `file_name`.
    #[must_use]
    pub fn step_positions(&self, file_name: &str) -> Vec<StepPosition> {
        self.steps().step_positions(file_name)
    }

    /// Returns all the files containing step implementations.
    #[must_use]
    pub fn implementation_files(&self) -> Vec<String> {
        self.steps().implementation_files()
    }

    /// Registers a step implementation discovered after start.
    pub fn register_step(&self, method: &Method) {
        self.steps_mut().register(method);
    }

    /// Handles a change of an implementation file.
    ///
    /// The steps of a changed or deleted file are forgotten, to be registered
    /// again by whoever discovers them.
    pub fn cache_file(&self, file_name: &str, status: FileStatus) {
        debug!(file_name, ?status, "implementation file cached");
        if matches!(status, FileStatus::Changed | FileStatus::Deleted) {
            self.steps_mut().remove_steps(file_name);
        }
    }

    /// Runs the hooks of the `hook_type` on the stream of the `request`,
    /// handling the instance scopes and data stores of its level.
    fn run_hooks(
        &self,
        hook_type: HookType,
        request: LifecycleRequest,
    ) -> impl Future<Output = ExecutionReport> + Send + 'static {
        let orchestrator = Arc::clone(&self.orchestrator);
        let clear_cache = hook_type.is_after()
            && self.config.clears_state_after(hook_type.level());
        let LifecycleRequest { stream, info } = request;

        self.schedule(stream, async move {
            if hook_type == HookType::BeforeScenario {
                orchestrator.start_execution_scope(SCENARIO_SCOPE);
            }

            let tags = info.applicable_tags(hook_type.level());
            let report = orchestrator
                .execute_hooks(
                    hook_type,
                    hook_type.strategy(),
                    &tags,
                    stream,
                    &info,
                )
                .await;

            if clear_cache {
                orchestrator.clear_cache();
            }
            match hook_type {
                HookType::AfterScenario => {
                    orchestrator.close_execution_scope();
                    orchestrator.data_stores().close(Scope::Scenario, stream);
                }
                HookType::AfterSpec => {
                    orchestrator.data_stores().close(Scope::Spec, stream);
                }
                _ => {}
            }
            report
        })
    }

    /// Initializes the data store of the `scope` on the `stream`.
    fn init_data_store(
        &self,
        scope: Scope,
        stream: StreamId,
    ) -> impl Future<Output = InitReport> + Send + 'static {
        let orchestrator = Arc::clone(&self.orchestrator);

        self.schedule(stream, async move {
            orchestrator.init_data_store(scope, stream).map_or_else(
                |e| {
                    warn!(%scope, %stream, error = %e, "data store not initialized");
                    InitReport::error(e.to_string())
                },
                |()| InitReport::default(),
            )
        })
    }

    /// Enqueues the `work` to the `stream` right away, turning a rejection
    /// into a failed report.
    fn schedule<F, R>(
        &self,
        stream: StreamId,
        work: F,
    ) -> impl Future<Output = R> + Send + 'static
    where
        F: Future<Output = R> + Send + 'static,
        R: From<SchedulerError> + Send + 'static,
    {
        self.scheduler.execute(stream, work).map(move |res| {
            res.unwrap_or_else(|e| {
                warn!(%stream, error = %e, "work not executed");
                R::from(e)
            })
        })
    }

    /// Locks the step registry for reading.
    fn steps(&self) -> RwLockReadGuard<'_, step::Registry> {
        self.steps.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the step registry for writing.
    fn steps_mut(&self) -> RwLockWriteGuard<'_, step::Registry> {
        self.steps.write().unwrap_or_else(PoisonError::into_inner)
    }
}
