// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Registry`] of hooks by their [`HookType`].

use std::collections::HashMap;

use super::{HookMethod, HookType};

/// Hooks grouped by the [`HookType`] they are bound to.
///
/// Immutable once handed over to a [`Runner`].
///
/// [`Runner`]: crate::Runner
#[derive(Clone, Debug, Default)]
pub struct Registry {
    /// Hooks by [`HookType`], in registration order.
    hooks: HashMap<HookType, Vec<HookMethod>>,
}

impl Registry {
    /// Creates a new empty [`Registry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the given `hook` under its [`HookType`].
    pub fn add(&mut self, hook: HookMethod) {
        self.hooks.entry(hook.hook_type).or_default().push(hook);
    }

    /// Adds the given `hook` to this [`Registry`].
    #[must_use]
    pub fn hook(mut self, hook: HookMethod) -> Self {
        self.add(hook);
        self
    }

    /// Returns the hooks bound to the given [`HookType`].
    #[must_use]
    pub fn hooks(&self, hook_type: HookType) -> &[HookMethod] {
        self.hooks
            .get(&hook_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the total number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Indicates whether no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::Callable;

    #[test]
    fn groups_by_hook_type() {
        let before = HookMethod::new(
            HookType::BeforeSpec,
            Callable::new("Hooks", "Before"),
        );
        let after =
            HookMethod::new(HookType::AfterSpec, Callable::new("Hooks", "After"));
        let registry = Registry::new().hook(before.clone()).hook(after.clone());

        assert_eq!(registry.hooks(HookType::BeforeSpec), [before]);
        assert_eq!(registry.hooks(HookType::AfterSpec), [after]);
        assert!(registry.hooks(HookType::BeforeConcept).is_empty());
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
