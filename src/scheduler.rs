// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Scheduler`] of work items by execution stream.
//!
//! Work items of a single stream run one by one, in submission order, so the
//! lifecycle events of a stream never interleave, while different streams
//! progress independently.
//!
//! The [`Scheduler`] owns no threads: a work item is polled by whoever awaits
//! its [`Ticket`], on the caller's executor, so user code may freely use the
//! caller's runtime (timers, sockets, file I/O). A [`Ticket`] starts its work
//! item only once the previous [`Ticket`] of the same stream has completed or
//! has been dropped.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    mem,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    task,
};

use derive_more::with_trait::Display;
use futures::{
    channel::oneshot,
    future::{self, CatchUnwind},
    FutureExt as _,
};
use pin_project::pin_project;
use tracing::debug;

use crate::error::{panic_message, SchedulerError};

/// Identifier of an execution stream, as assigned by the host.
#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[display("{_0}")]
pub struct StreamId(pub u32);

impl StreamId {
    /// Stream everything runs on, unless the host executes in parallel.
    pub const DEFAULT: Self = Self(1);
}

impl Default for StreamId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sequencer of work items by stream.
///
/// Once [`dispose`](Scheduler::dispose)d, no more work is accepted.
pub struct Scheduler {
    /// Completion signal of the last work item submitted to each stream.
    tails: Mutex<HashMap<StreamId, oneshot::Receiver<()>>>,

    /// Indicator whether streams run concurrently. Otherwise every stream
    /// collapses into [`StreamId::DEFAULT`].
    multithreaded: bool,

    /// Indicator whether this [`Scheduler`] has been disposed.
    disposed: AtomicBool,
}

// Implemented manually to list the known streams only.
impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut streams = self.tails().keys().copied().collect::<Vec<_>>();
        streams.sort_unstable();
        f.debug_struct("Scheduler")
            .field("streams", &streams)
            .field("multithreaded", &self.multithreaded)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Scheduler {
    /// Creates a new [`Scheduler`] without any streams.
    #[must_use]
    pub fn new(multithreaded: bool) -> Self {
        Self {
            tails: Mutex::default(),
            multithreaded,
            disposed: AtomicBool::new(false),
        }
    }

    /// Returns the stream the work of the `requested` one actually runs on.
    #[must_use]
    pub const fn stream(&self, requested: StreamId) -> StreamId {
        if self.multithreaded {
            requested
        } else {
            StreamId::DEFAULT
        }
    }

    /// Indicates whether this [`Scheduler`] has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Enqueues the `work` to the `stream`.
    ///
    /// The position in the queue is taken right away, not on the first poll
    /// of the returned [`Ticket`]. The [`Ticket`] resolves once the `work`
    /// completes, or to a [`SchedulerError`] if this [`Scheduler`] is
    /// disposed or the `work` panics.
    pub fn execute<F: Future>(&self, stream: StreamId, work: F) -> Ticket<F> {
        let stream = self.stream(stream);
        let work = AssertUnwindSafe(work).catch_unwind();

        let mut tails = self.tails();
        if self.is_disposed() {
            return Ticket {
                previous: None,
                work,
                done: None,
                rejected: Some(SchedulerError::Disposed { stream }),
            };
        }
        let (done, tail) = oneshot::channel();
        let previous = tails.insert(stream, tail);
        if previous.is_none() {
            debug!(%stream, "opened stream queue");
        }

        Ticket { previous, work, done: Some(done), rejected: None }
    }

    /// Stops accepting work and waits until all the already submitted work
    /// completes or is dropped.
    ///
    /// Idempotent.
    pub async fn dispose(&self) {
        let tails = {
            let mut tails = self.tails();
            self.disposed.store(true, Ordering::Release);
            mem::take(&mut *tails)
        };

        _ = future::join_all(tails.into_values()).await;
        debug!("scheduler disposed");
    }

    /// Locks the stream queues, ignoring poisoning.
    fn tails(&self) -> MutexGuard<'_, HashMap<StreamId, oneshot::Receiver<()>>> {
        self.tails.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`Future`] of a work item submitted to a [`Scheduler`].
///
/// Never resolves while an earlier [`Ticket`] of the same stream is pending,
/// so the [`Ticket`]s of one stream must be awaited in submission order, or
/// concurrently.
#[pin_project]
pub struct Ticket<F> {
    /// Completion signal of the previous work item of the stream.
    #[pin]
    previous: Option<oneshot::Receiver<()>>,

    /// Work item itself.
    #[pin]
    work: CatchUnwind<AssertUnwindSafe<F>>,

    /// Completion signal of this work item, released on drop as well.
    done: Option<oneshot::Sender<()>>,

    /// Error the work item was rejected with, if any.
    rejected: Option<SchedulerError>,
}

impl<F> fmt::Debug for Ticket<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("waiting", &self.previous.is_some())
            .field("rejected", &self.rejected)
            .finish_non_exhaustive()
    }
}

impl<F: Future> Future for Ticket<F> {
    type Output = Result<F::Output, SchedulerError>;

    fn poll(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Self::Output> {
        let mut this = self.project();
        if let Some(e) = this.rejected.take() {
            return task::Poll::Ready(Err(e));
        }

        if let Some(previous) = this.previous.as_mut().as_pin_mut() {
            // A dropped sender releases the stream just like a sent one.
            _ = task::ready!(previous.poll(cx));
            this.previous.set(None);
        }

        let output = task::ready!(this.work.poll(cx));
        if let Some(done) = this.done.take() {
            _ = done.send(());
        }
        task::Poll::Ready(output.map_err(|payload| SchedulerError::Panicked {
            message: panic_message(payload.as_ref()),
        }))
    }
}
