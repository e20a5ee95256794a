//! The consumer-facing point lookup over a composite object.

use crate::delegate::external::CompositeObject;
use crate::json_ext::Path;
use serde_json_bytes::Value;

/// Resolve one response key of a composite object.
///
/// A key whose value has already been merged answers immediately; a key
/// whose owning source deferred it is awaited on that source's receiver,
/// `path` being the response path of the field being resolved. A key no
/// source can deliver resolves to an absent value.
pub async fn resolve_merged_field(
    object: &CompositeObject,
    response_key: &str,
    path: &Path,
) -> Option<Value> {
    if let Some(value) = object.field(response_key) {
        return Some(value);
    }

    match object.receiver_for(response_key) {
        Some(receiver) => receiver.request(path).await,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::receiver::Receiver;
    use crate::delegate::sources::Source;
    use crate::response::Response;
    use crate::response::ResponseStream;
    use futures::prelude::*;
    use serde_json_bytes::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn materialized_and_deferred_fields_resolve() {
        let origin = Arc::new(Source::new("accounts", HashMap::new()));

        let stream: ResponseStream = stream::iter(vec![Response::builder()
            .data(json!({"deferred": "later"}))
            .path(Path::empty())
            .has_next(false)
            .build()])
        .boxed();
        let receiver = Receiver::new("accounts", stream, json!({"id": "1"}), 0);

        let object = CompositeObject::annotate(
            json!({"id": "1"}).as_object().cloned().unwrap(),
            Vec::new(),
            origin,
            Some(receiver),
        );

        assert_eq!(
            resolve_merged_field(&object, "id", &Path::from("id")).await,
            Some(json!("1"))
        );
        assert_eq!(
            resolve_merged_field(&object, "deferred", &Path::from("deferred")).await,
            Some(json!("later"))
        );
        assert_eq!(
            resolve_merged_field(&object, "unknown", &Path::from("unknown")).await,
            None
        );
    }
}
