// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step implementations and the [`Registry`] resolving step texts to them.
//!
//! - [`value`]: parameter-erased [`StepValue`]s
//! - [`method`]: [`Method`] metadata of a step implementation
//! - [`registry`]: the [`Registry`] itself

pub mod method;
pub mod registry;
pub mod value;

pub use self::{
    method::{Method, SourceSpan},
    registry::{Registry, StepPosition},
    value::{StepValue, PARAMETER_TOKEN},
};
