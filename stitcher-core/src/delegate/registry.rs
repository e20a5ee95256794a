use crate::context::Context;
use crate::delegate::external::CompositeObject;
use crate::delegate::sources::Source;
use crate::error::FetchError;
use crate::response::ResponseStream;
use crate::spec::SelectionSet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The externally supplied capability to execute a selection set against a
/// source.
///
/// The planner does not know or care how this happens: network call, local
/// call, etc. The returned stream carries the source's primary payload
/// followed by any number of patches, per the incremental protocol.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(
        &self,
        object: &CompositeObject,
        context: &Context,
        source: &Arc<Source>,
        selection_set: &SelectionSet,
    ) -> Result<ResponseStream, FetchError>;
}

/// The resolvers for each known source, keyed by source name.
#[derive(Default)]
pub struct SourceRegistry {
    resolvers: HashMap<String, Arc<dyn SourceResolver>>,
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut debug = f.debug_tuple("SourceRegistry");
        for name in self.resolvers.keys() {
            debug.field(name);
        }
        debug.finish()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert<R>(&mut self, name: impl Into<String>, resolver: R)
    where
        R: SourceResolver + 'static,
    {
        self.resolvers.insert(name.into(), Arc::new(resolver));
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.resolvers.contains_key(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub(crate) fn get(&self, name: impl AsRef<str>) -> Option<Arc<dyn SourceResolver>> {
        self.resolvers.get(name.as_ref()).cloned()
    }
}
