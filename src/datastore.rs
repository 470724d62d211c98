// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! User-managed key/value state of nested lifetimes.
//!
//! The [`Scope::Suite`] store is process-wide and shared by all streams. The
//! [`Scope::Spec`] and [`Scope::Scenario`] ones are partitioned by stream, so
//! only the work of the owning stream ever touches them.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use derive_more::with_trait::Display;

use crate::{
    error::{panic_message, DataStoreError},
    invoke::InvocationError,
    StreamId,
};

/// Lifetime of a [`DataStore`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Scope {
    /// Whole test run.
    #[display("suite")]
    Suite,

    /// Single specification.
    #[display("spec")]
    Spec,

    /// Single scenario.
    #[display("scenario")]
    Scenario,
}

/// Type-erased value kept in a [`DataStore`].
type Value = Arc<dyn Any + Send + Sync>;

/// Cloneable handle to a key/value store.
///
/// Clones share the same underlying entries.
#[derive(Clone, Default)]
pub struct DataStore {
    /// Stored entries.
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

// Implemented manually, as stored values are not `Debug`.
impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        let mut keys = entries.keys().collect::<Vec<_>>();
        keys.sort_unstable();
        f.debug_struct("DataStore").field("keys", &keys).finish()
    }
}

impl DataStore {
    /// Creates a new empty [`DataStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the `value` under the `key`, replacing any previous one.
    pub fn add<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        _ = self.lock().insert(key.into(), Arc::new(value));
    }

    /// Returns the value stored under the `key`, if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.lock()
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Removes the value stored under the `key`, returning whether there
    /// was one.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Removes all the entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Indicates whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the entries, ignoring poisoning by panicked user code.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`DataStore`]s visible to a single stream at some point of time.
#[derive(Clone, Debug, Default)]
pub struct Stores {
    /// [`Scope::Suite`] store.
    pub suite: DataStore,

    /// [`Scope::Spec`] store, if the stream is inside a spec.
    pub spec: Option<DataStore>,

    /// [`Scope::Scenario`] store, if the stream is inside a scenario.
    pub scenario: Option<DataStore>,
}

/// Owner of all the [`DataStore`]s of the process.
#[derive(Debug, Default)]
pub struct DataStores {
    /// Process-wide [`Scope::Suite`] store.
    suite: Mutex<DataStore>,

    /// [`Scope::Spec`] stores by stream.
    spec: Mutex<HashMap<StreamId, DataStore>>,

    /// [`Scope::Scenario`] stores by stream.
    scenario: Mutex<HashMap<StreamId, DataStore>>,
}

impl DataStores {
    /// Creates new [`DataStores`] with an empty suite store only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)creates the [`DataStore`] of the given [`Scope`] for the stream
    /// and lets the `prepare` seed it.
    ///
    /// The fresh store replaces the previous one even if the `prepare` fails.
    ///
    /// # Errors
    ///
    /// If the `prepare` fails or panics.
    pub fn initialize<P>(
        &self,
        scope: Scope,
        stream: StreamId,
        prepare: P,
    ) -> Result<(), DataStoreError>
    where
        P: FnOnce(&DataStore) -> Result<(), InvocationError>,
    {
        let store = DataStore::new();
        match scope {
            Scope::Suite => {
                *self.suite.lock().unwrap_or_else(PoisonError::into_inner) =
                    store.clone();
            }
            Scope::Spec => {
                _ = Self::per_stream(&self.spec).insert(stream, store.clone());
            }
            Scope::Scenario => {
                _ = Self::per_stream(&self.scenario)
                    .insert(stream, store.clone());
            }
        }

        let failed = |message| DataStoreError { scope, stream, message };
        panic::catch_unwind(AssertUnwindSafe(|| prepare(&store)))
            .map_err(|payload| failed(panic_message(payload.as_ref())))?
            .map_err(|e| failed(e.full_text()))
    }

    /// Destroys the [`DataStore`] of the given [`Scope`] for the stream.
    ///
    /// The [`Scope::Suite`] store lives as long as the process, so it's only
    /// cleared.
    pub fn close(&self, scope: Scope, stream: StreamId) {
        match scope {
            Scope::Suite => self.suite().clear(),
            Scope::Spec => {
                _ = Self::per_stream(&self.spec).remove(&stream);
            }
            Scope::Scenario => {
                _ = Self::per_stream(&self.scenario).remove(&stream);
            }
        }
    }

    /// Returns the process-wide [`Scope::Suite`] store.
    #[must_use]
    pub fn suite(&self) -> DataStore {
        self.suite.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the [`Scope::Spec`] store of the stream, if initialized.
    #[must_use]
    pub fn spec(&self, stream: StreamId) -> Option<DataStore> {
        Self::per_stream(&self.spec).get(&stream).cloned()
    }

    /// Returns the [`Scope::Scenario`] store of the stream, if initialized.
    #[must_use]
    pub fn scenario(&self, stream: StreamId) -> Option<DataStore> {
        Self::per_stream(&self.scenario).get(&stream).cloned()
    }

    /// Returns all the [`Stores`] currently visible to the stream.
    #[must_use]
    pub fn snapshot(&self, stream: StreamId) -> Stores {
        Stores {
            suite: self.suite(),
            spec: self.spec(stream),
            scenario: self.scenario(stream),
        }
    }

    /// Locks a per-stream map, ignoring poisoning.
    fn per_stream(
        map: &Mutex<HashMap<StreamId, DataStore>>,
    ) -> std::sync::MutexGuard<'_, HashMap<StreamId, DataStore>> {
        map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let store = DataStore::new();
        store.add("count", 3_u32);
        store.add("name", "gauge".to_owned());

        assert_eq!(store.get::<u32>("count").as_deref(), Some(&3));
        assert_eq!(store.get::<String>("name").as_deref().map(String::as_str), Some("gauge"));
        assert!(store.get::<i64>("count").is_none());
        assert!(store.get::<u32>("missing").is_none());
        assert_eq!(store.len(), 2);

        assert!(store.remove("count"));
        assert!(!store.remove("count"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let store = DataStore::new();
        store.clone().add("key", true);

        assert_eq!(store.get::<bool>("key").as_deref(), Some(&true));
    }

    #[test]
    fn spec_and_scenario_stores_are_per_stream() {
        let stores = DataStores::new();
        stores.initialize(Scope::Spec, StreamId(1), |_| Ok(())).unwrap();
        stores.initialize(Scope::Scenario, StreamId(1), |_| Ok(())).unwrap();

        stores.spec(StreamId(1)).unwrap().add("k", 1_i32);
        assert!(stores.spec(StreamId(2)).is_none());

        stores.initialize(Scope::Spec, StreamId(2), |_| Ok(())).unwrap();
        assert!(stores.spec(StreamId(2)).unwrap().is_empty());
        assert_eq!(stores.spec(StreamId(1)).unwrap().len(), 1);

        stores.close(Scope::Scenario, StreamId(1));
        let snapshot = stores.snapshot(StreamId(1));
        assert!(snapshot.spec.is_some());
        assert!(snapshot.scenario.is_none());
    }

    #[test]
    fn reinitializing_recreates_store() {
        let stores = DataStores::new();
        stores.initialize(Scope::Scenario, StreamId(1), |_| Ok(())).unwrap();
        stores.scenario(StreamId(1)).unwrap().add("k", 1_i32);

        stores.initialize(Scope::Scenario, StreamId(1), |_| Ok(())).unwrap();

        assert!(stores.scenario(StreamId(1)).unwrap().is_empty());
    }

    #[test]
    fn suite_store_is_shared() {
        let stores = DataStores::new();
        stores.snapshot(StreamId(1)).suite.add("shared", 7_u8);

        assert_eq!(
            stores.snapshot(StreamId(2)).suite.get::<u8>("shared").as_deref(),
            Some(&7),
        );

        stores.initialize(Scope::Suite, StreamId(1), |_| Ok(())).unwrap();
        assert!(stores.suite().is_empty());
    }

    #[test]
    fn prepare_seeds_fresh_store() {
        let stores = DataStores::new();
        stores.initialize(Scope::Spec, StreamId(1), |_| Ok(())).unwrap();
        stores.spec(StreamId(1)).unwrap().add("stale", true);

        stores
            .initialize(Scope::Spec, StreamId(1), |store| {
                assert!(store.is_empty());
                store.add("browser", "firefox");
                Ok(())
            })
            .unwrap();

        let spec = stores.spec(StreamId(1)).unwrap();
        assert!(spec.get::<bool>("stale").is_none());
        assert_eq!(spec.get::<&str>("browser").as_deref(), Some(&"firefox"));
    }

    #[test]
    fn captures_prepare_failures() {
        let stores = DataStores::new();

        let failed = stores.initialize(Scope::Scenario, StreamId(2), |_| {
            Err(InvocationError::new("IOException", "disk full"))
        });
        let panicked = stores
            .initialize(Scope::Suite, StreamId(1), |_| panic!("no suite today"));

        assert_eq!(
            failed,
            Err(DataStoreError {
                scope: Scope::Scenario,
                stream: StreamId(2),
                message: "IOException: disk full".into(),
            }),
        );
        assert_eq!(
            panicked.unwrap_err().to_string(),
            "Failed to initialize suite data store of stream 1: no suite today",
        );
        assert!(stores.scenario(StreamId(2)).is_some());
    }
}
