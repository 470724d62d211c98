// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Registry`] of step implementations keyed by their step values.

use std::collections::HashMap;

use itertools::Itertools as _;

use crate::error::RegistryError;

use super::{Method, SourceSpan};

/// Position of a step implementation inside a source file.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct StepPosition {
    /// Step value of the implementation.
    pub step_value: String,

    /// [`SourceSpan`] of the implementation.
    pub span: Option<SourceSpan>,
}

/// Mapping of step values to their implementing [`Method`]s.
///
/// Registering a second, different [`Method`] under an already known step
/// value doesn't overwrite the first one: both are kept and the value is
/// reported as having multiple implementations.
///
/// Not synchronized: callers serialize mutation and lookups.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    /// Implementations by step value, in registration order.
    methods: HashMap<String, Vec<Method>>,
}

impl Registry {
    /// Creates a new empty [`Registry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the `method` under the given `step_value`.
    ///
    /// Registering the same [`Callable`] twice under one step value is a
    /// no-op.
    ///
    /// [`Callable`]: crate::Callable
    pub fn add_step(&mut self, step_value: impl Into<String>, method: Method) {
        let methods = self.methods.entry(step_value.into()).or_default();
        if !methods.iter().any(|m| m.callable == method.callable) {
            methods.push(method);
        }
    }

    /// Registers the `method` under the step values of all its aliases.
    pub fn register(&mut self, method: &Method) {
        for alias in method.per_alias() {
            self.add_step(alias.step_value.clone(), alias);
        }
    }

    /// Adds the given `method` to this [`Registry`], see
    /// [`Registry::register()`].
    #[must_use]
    pub fn step(mut self, method: Method) -> Self {
        self.register(&method);
        self
    }

    /// Indicates whether any implementation is registered for the
    /// `step_value`.
    #[must_use]
    pub fn contains_step(&self, step_value: &str) -> bool {
        self.methods.get(step_value).is_some_and(|m| !m.is_empty())
    }

    /// Returns the [`Method`] implementing the `step_value`.
    ///
    /// When there are several implementations, the first registered one is
    /// returned. Use [`Registry::unique_method_for()`] where ambiguity
    /// matters.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if nothing implements the `step_value`.
    pub fn method_for(&self, step_value: &str) -> Result<&Method, RegistryError> {
        self.methods_for(step_value)
            .first()
            .ok_or_else(|| RegistryError::not_found(step_value))
    }

    /// Returns the only [`Method`] implementing the `step_value`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] if nothing implements the `step_value`;
    /// - [`RegistryError::Duplicate`] if several [`Method`]s implement it.
    pub fn unique_method_for(
        &self,
        step_value: &str,
    ) -> Result<&Method, RegistryError> {
        match self.methods_for(step_value) {
            [] => Err(RegistryError::not_found(step_value)),
            [method] => Ok(method),
            many => Err(RegistryError::duplicate(step_value, many.len())),
        }
    }

    /// Returns all the [`Method`]s implementing the `step_value`.
    #[must_use]
    pub fn methods_for(&self, step_value: &str) -> &[Method] {
        self.methods.get(step_value).map(Vec::as_slice).unwrap_or_default()
    }

    /// Indicates whether more than one [`Method`] implements the
    /// `step_value`.
    #[must_use]
    pub fn has_multiple_implementations(&self, step_value: &str) -> bool {
        self.methods_for(step_value).len() > 1
    }

    /// Indicates whether the implementation of the `step_value` is bound to
    /// more than one literal step text.
    #[must_use]
    pub fn has_alias(&self, step_value: &str) -> bool {
        self.methods_for(step_value).iter().any(|m| m.is_alias)
    }

    /// Returns the literal step text of the `step_value`, or an empty string
    /// if it's unknown.
    #[must_use]
    pub fn step_text(&self, step_value: &str) -> String {
        self.methods_for(step_value)
            .first()
            .map(|m| m.step_text.clone())
            .unwrap_or_default()
    }

    /// Removes every [`Method`] declared in the given source file.
    pub fn remove_steps(&mut self, file_name: &str) {
        self.methods.retain(|_, methods| {
            methods.retain(|m| m.file_name.as_deref() != Some(file_name));
            !methods.is_empty()
        });
    }

    /// Iterates over all the registered step values.
    pub fn all_steps(&self) -> impl Iterator<Item = &str> + '_ {
        self.methods.keys().map(String::as_str)
    }

    /// Returns all the literal step texts, aliases included, without
    /// duplicates.
    #[must_use]
    pub fn step_texts(&self) -> Vec<String> {
        self.methods
            .values()
            .flatten()
            .map(|m| m.step_text.clone())
            .unique()
            .collect()
    }

    /// Returns the positions of all the steps declared in the given source
    /// file.
    #[must_use]
    pub fn step_positions(&self, file_name: &str) -> Vec<StepPosition> {
        self.methods
            .iter()
            .flat_map(|(value, methods)| {
                methods
                    .iter()
                    .filter(move |m| m.file_name.as_deref() == Some(file_name))
                    .map(move |m| StepPosition {
                        step_value: value.clone(),
                        span: m.span,
                    })
            })
            .sorted()
            .collect()
    }

    /// Returns the distinct source files declaring registered steps.
    #[must_use]
    pub fn implementation_files(&self) -> Vec<String> {
        self.methods
            .values()
            .flatten()
            .filter_map(|m| m.file_name.clone())
            .sorted()
            .dedup()
            .collect()
    }
}
