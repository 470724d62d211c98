// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Policies of selecting and ordering the hooks applicable to an event.
//!
//! Within each group hooks are ordered by their fully-qualified names, so the
//! selection is reproducible across runs with identical registrations.

use std::fmt::Debug;

use itertools::Itertools as _;
use sealed::sealed;

use super::HookMethod;

/// Policy of computing the ordered subset of hooks to execute.
#[sealed]
pub trait Strategy: Debug + Send + Sync {
    /// Returns the hooks applicable to the `tags`, in execution order.
    #[must_use]
    fn applicable_hooks<'h>(
        &self,
        tags: &[String],
        hooks: &'h [HookMethod],
    ) -> Vec<&'h HookMethod>;
}

/// All the applicable hooks, tagged and untagged ones together.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plain;

/// Applicable tagged hooks first, then the untagged ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaggedHooksFirst;

/// Untagged hooks first, then the applicable tagged ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct UntaggedHooksFirst;

#[sealed]
impl Strategy for Plain {
    fn applicable_hooks<'h>(
        &self,
        tags: &[String],
        hooks: &'h [HookMethod],
    ) -> Vec<&'h HookMethod> {
        by_name(hooks.iter().filter(|h| h.is_applicable(tags)))
    }
}

#[sealed]
impl Strategy for TaggedHooksFirst {
    fn applicable_hooks<'h>(
        &self,
        tags: &[String],
        hooks: &'h [HookMethod],
    ) -> Vec<&'h HookMethod> {
        let mut selected = tagged(tags, hooks);
        selected.extend(untagged(hooks));
        selected
    }
}

#[sealed]
impl Strategy for UntaggedHooksFirst {
    fn applicable_hooks<'h>(
        &self,
        tags: &[String],
        hooks: &'h [HookMethod],
    ) -> Vec<&'h HookMethod> {
        let mut selected = untagged(hooks);
        selected.extend(tagged(tags, hooks));
        selected
    }
}

/// Returns the tagged `hooks` applicable to the `tags`, ordered by name.
fn tagged<'h>(tags: &[String], hooks: &'h [HookMethod]) -> Vec<&'h HookMethod> {
    by_name(
        hooks
            .iter()
            .filter(|h| !h.is_untagged() && h.is_applicable(tags)),
    )
}

/// Returns the untagged `hooks`, ordered by name.
fn untagged(hooks: &[HookMethod]) -> Vec<&HookMethod> {
    by_name(hooks.iter().filter(|h| h.is_untagged()))
}

/// Orders `hooks` by their fully-qualified names, keeping registration order
/// of equally named ones.
fn by_name<'h>(hooks: impl Iterator<Item = &'h HookMethod>) -> Vec<&'h HookMethod> {
    hooks.sorted_by(|a, b| a.name().cmp(b.name())).collect()
}
