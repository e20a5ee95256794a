//! Reconciliation of one source's incremental stream into point-queryable
//! state.

use crate::json_ext::Path;
use crate::json_ext::ValueExt;
use crate::response::Response;
use crate::response::ResponseStream;
use derivative::Derivative;
use futures::prelude::*;
use parking_lot::Mutex;
use serde_json_bytes::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// One patch was merged into the materialized tree, or the stream ended.
#[derive(Clone, Debug)]
enum PatchEvent {
    Patch(Arc<Response>),
    Exhausted,
}

#[derive(Debug)]
struct ReceiverState {
    /// The materialized, growing result tree for this source.
    result: Value,

    /// True once the stream has begun being drained. Guarantees at most one
    /// active consumption loop regardless of how many lookups trigger it.
    consuming: bool,

    /// True once the stream has been drained to its end.
    exhausted: bool,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Shared {
    service: String,

    state: Mutex<ReceiverState>,

    #[derivative(Debug = "ignore")]
    patches: broadcast::Sender<PatchEvent>,
}

/// Consumes one source's incremental stream exactly once and answers point
/// queries for arbitrary response paths, suspending callers until the
/// relevant patch arrives.
///
/// The drain loop is started lazily, on the first lookup that misses the
/// materialized tree, and merges each patch into the tree and broadcasts it
/// to the current waiters in one uninterrupted step. Stream exhaustion
/// releases every outstanding waiter with an absent value.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Receiver {
    /// How many leading segments of a requested path address the part of
    /// the response tree this source's stream is rooted under.
    path_prefix: usize,

    #[derivative(Debug = "ignore")]
    stream: Mutex<Option<ResponseStream>>,

    shared: Arc<Shared>,
}

impl Receiver {
    pub(crate) fn new(
        service: impl Into<String>,
        stream: ResponseStream,
        initial_data: Value,
        path_prefix: usize,
    ) -> Arc<Receiver> {
        let (patches, _) = broadcast::channel(16);
        Arc::new(Receiver {
            path_prefix,
            stream: Mutex::new(Some(stream)),
            shared: Arc::new(Shared {
                service: service.into(),
                state: Mutex::new(ReceiverState {
                    result: initial_data,
                    consuming: false,
                    exhausted: false,
                }),
                patches,
            }),
        })
    }

    pub fn service(&self) -> &str {
        &self.shared.service
    }

    /// Look up `path` in this source's result tree, suspending until a patch
    /// covering it arrives if it has not yet.
    ///
    /// A lookup whose target never arrives resolves to `None` once the
    /// stream is exhausted.
    pub async fn request(&self, path: &Path) -> Option<Value> {
        let requested = path.slice_from(self.path_prefix);

        let mut events = {
            let mut state = self.shared.state.lock();
            if let Some(value) = state.result.data_at_path(&requested) {
                return Some(value.clone());
            }
            if state.exhausted {
                return None;
            }

            // subscribing under the same lock the drain loop merges under
            // guarantees no patch falls between the miss above and the first
            // recv below
            let events = self.shared.patches.subscribe();
            if !state.consuming {
                state.consuming = true;
                if let Some(stream) = self.stream.lock().take() {
                    tracing::trace!(service = %self.shared.service, "starting incremental drain");
                    tokio::task::spawn(drain(self.shared.clone(), stream));
                }
            }
            events
        };

        loop {
            match events.recv().await {
                Ok(PatchEvent::Patch(patch)) => {
                    let patch_path = patch
                        .path
                        .as_ref()
                        .expect("only patch responses are broadcast; qed");
                    if patch_path.is_prefix_of(&requested) {
                        let relative = requested.slice_from(patch_path.len());
                        return patch.data.data_at_path(&relative).cloned();
                    }
                }
                Ok(PatchEvent::Exhausted) | Err(broadcast::error::RecvError::Closed) => {
                    return self
                        .shared
                        .state
                        .lock()
                        .result
                        .data_at_path(&requested)
                        .cloned();
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // missed patches are already merged into the tree
                    if let Some(value) =
                        self.shared.state.lock().result.data_at_path(&requested)
                    {
                        return Some(value.clone());
                    }
                }
            }
        }
    }
}

async fn drain(shared: Arc<Shared>, mut stream: ResponseStream) {
    while let Some(response) = stream.next().await {
        match &response.path {
            Some(path) => {
                let patch = Value::from_path(path, response.data.clone());
                let mut state = shared.state.lock();
                state.result.deep_merge(patch);
                let _ = shared.patches.send(PatchEvent::Patch(Arc::new(response)));
            }
            None => {
                failfast_debug!(
                    "source {:?} sent a second primary response on its patch stream",
                    shared.service
                );
            }
        }
    }

    let mut state = shared.state.lock();
    state.exhausted = true;
    let _ = shared.patches.send(PatchEvent::Exhausted);
}
