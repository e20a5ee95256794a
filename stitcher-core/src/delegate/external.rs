//! The provenance-tracked composite result: one logical object merged from
//! any number of partial source objects.

use crate::delegate::receiver::Receiver;
use crate::delegate::sources::Source;
use crate::error::Error;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::spec::response_keys;
use crate::spec::SelectionSet;
use parking_lot::Mutex;
use serde_json_bytes::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The outcome of one source call, as folded into a composite object.
pub(crate) enum SourceResult {
    /// The source answered with an object payload.
    Object(CompositeObject),

    /// The source answered with null; its errors, if any, are not yet
    /// attributable to a response path.
    Null(Vec<Error>),

    /// The call itself failed.
    Error(Error),
}

struct CompositeInner {
    data: Object,

    /// The source whose payload created this object.
    origin: Arc<Source>,

    /// Which source supplied each materialized response key. Keys are a
    /// subset of `data` keys; absence means the origin supplied the field.
    field_owner: HashMap<String, String>,

    /// Response keys that were requested of a source but not present in its
    /// initial payload: their values arrive on that source's patch stream.
    deferred_owner: HashMap<String, String>,

    /// Errors assigned to specific response paths.
    errors: Vec<Error>,

    /// Errors not yet attributable to a specific response path.
    unpathed_errors: Vec<Error>,

    /// The receiver servicing each source's incremental stream, keyed by
    /// source name.
    receivers: HashMap<String, Arc<Receiver>>,
}

/// One logical object merged from partial source objects.
///
/// The handle is cheap to clone and every clone shares identity: merging is
/// always in place, so field resolvers holding a reference keep seeing new
/// data as later delegation rounds contribute fields.
#[derive(Clone)]
pub struct CompositeObject {
    inner: Arc<Mutex<CompositeInner>>,
}

impl fmt::Debug for CompositeObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CompositeObject")
            .field("origin", &inner.origin.name)
            .field("data", &inner.data)
            .field("field_owner", &inner.field_owner)
            .field("receivers", &inner.receivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CompositeObject {
    /// Wrap a source's initial payload, seeding the receiver map with the
    /// origin's receiver when the source declared more data is coming.
    pub fn annotate(
        data: Object,
        errors: Vec<Error>,
        origin: Arc<Source>,
        receiver: Option<Arc<Receiver>>,
    ) -> Self {
        let mut receivers = HashMap::new();
        if let Some(receiver) = receiver {
            receivers.insert(origin.name.clone(), receiver);
        }
        CompositeObject {
            inner: Arc::new(Mutex::new(CompositeInner {
                data,
                origin,
                field_owner: HashMap::new(),
                deferred_owner: HashMap::new(),
                errors: Vec::new(),
                unpathed_errors: errors,
                receivers,
            })),
        }
    }

    /// The materialized value of a response key, if it has arrived.
    pub fn field(&self, key: &str) -> Option<Value> {
        self.inner.lock().data.get(key).cloned()
    }

    /// A snapshot of the materialized payload.
    pub fn data(&self) -> Object {
        self.inner.lock().data.clone()
    }

    pub fn origin(&self) -> Arc<Source> {
        self.inner.lock().origin.clone()
    }

    /// The source that supplied `key`, defaulting to the object's origin.
    pub fn owner_of(&self, key: &str) -> String {
        let inner = self.inner.lock();
        inner
            .field_owner
            .get(key)
            .cloned()
            .unwrap_or_else(|| inner.origin.name.clone())
    }

    /// Errors assigned to specific response paths.
    pub fn errors(&self) -> Vec<Error> {
        self.inner.lock().errors.clone()
    }

    /// Errors not yet attributable to a specific response path.
    pub fn unpathed_errors(&self) -> Vec<Error> {
        self.inner.lock().unpathed_errors.clone()
    }

    /// The receiver servicing the given source's incremental stream.
    pub fn receiver(&self, source_name: &str) -> Option<Arc<Receiver>> {
        self.inner.lock().receivers.get(source_name).cloned()
    }

    /// The names of the sources with an attached receiver.
    pub fn receiver_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().receivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The receiver expected to deliver the given response key.
    pub fn receiver_for(&self, key: &str) -> Option<Arc<Receiver>> {
        let inner = self.inner.lock();
        let owner = inner
            .deferred_owner
            .get(key)
            .or_else(|| inner.field_owner.get(key));
        if let Some(receiver) = owner.and_then(|owner| inner.receivers.get(owner)) {
            return Some(receiver.clone());
        }
        if let Some(receiver) = inner.receivers.get(&inner.origin.name) {
            return Some(receiver.clone());
        }
        // a single attached stream is unambiguous even without provenance
        if inner.receivers.len() == 1 {
            return inner.receivers.values().next().cloned();
        }
        None
    }

    /// Fold a delegation round's source results into this object, in place.
    ///
    /// For each source, the response keys actually requested of it are
    /// recovered by re-classifying its selection set against `type_name`.
    /// An erroring or null source assigns null to each of those keys (with a
    /// path-relocated copy of the error recorded for the error case); an
    /// object source has each requested key copied over, with provenance
    /// recording the source that originally supplied the field so that it
    /// survives multiple hops. Receivers, unpathed errors and provenance of
    /// object sources are unioned into this object.
    pub(crate) fn merge_sources(
        &self,
        type_name: &str,
        results: Vec<(SourceResult, SelectionSet)>,
        path: &Path,
    ) {
        let mut inner = self.inner.lock();

        for (result, selection_set) in results {
            let keys = response_keys(type_name, &selection_set);

            match result {
                SourceResult::Error(error) => {
                    for key in keys {
                        inner.data.insert(key.as_str(), Value::Null);
                        inner.field_owner.remove(&key);
                        let relocated = error.relocated(path.join(&Path::from(key.as_str())));
                        inner.errors.push(relocated);
                    }
                }
                SourceResult::Null(errors) => {
                    for key in keys {
                        inner.data.insert(key.as_str(), Value::Null);
                        inner.field_owner.remove(&key);
                    }
                    inner.unpathed_errors.extend(errors);
                }
                SourceResult::Object(child) => {
                    let child = child.inner.lock();

                    for key in keys {
                        match child.data.get(key.as_str()) {
                            Some(value) => {
                                inner.data.insert(key.as_str(), value.clone());
                                let owner = child
                                    .field_owner
                                    .get(&key)
                                    .cloned()
                                    .unwrap_or_else(|| child.origin.name.clone());
                                inner.field_owner.insert(key.clone(), owner);
                                inner.deferred_owner.remove(&key);
                            }
                            None if !child.receivers.is_empty() => {
                                // requested but not delivered yet: the value
                                // arrives on the queried source's patch stream
                                let owner = child
                                    .deferred_owner
                                    .get(&key)
                                    .cloned()
                                    .unwrap_or_else(|| child.origin.name.clone());
                                inner.deferred_owner.insert(key, owner);
                            }
                            None => {}
                        }
                    }

                    for (name, receiver) in child.receivers.iter() {
                        inner.receivers.insert(name.clone(), receiver.clone());
                    }
                    inner
                        .unpathed_errors
                        .extend(child.unpathed_errors.iter().cloned());
                    inner.errors.extend(child.errors.iter().cloned());
                    for (key, owner) in child.field_owner.iter() {
                        if inner.data.contains_key(key.as_str())
                            && !inner.field_owner.contains_key(key)
                        {
                            inner.field_owner.insert(key.clone(), owner.clone());
                        }
                    }
                    for (key, owner) in child.deferred_owner.iter() {
                        if !inner.data.contains_key(key.as_str()) {
                            inner
                                .deferred_owner
                                .entry(key.clone())
                                .or_insert_with(|| owner.clone());
                        }
                    }
                }
            }
        }
    }
}
