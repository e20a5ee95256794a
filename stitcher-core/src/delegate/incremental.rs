//! Adaptation of a source's response stream into an initial payload plus,
//! when the source declared more data is coming, a [`Receiver`] draining
//! the remainder.

use crate::delegate::receiver::Receiver;
use crate::delegate::sources::Source;
use crate::error::FetchError;
use crate::response::Response;
use crate::response::ResponseStream;
use futures::prelude::*;
use std::sync::Arc;

/// Pull exactly one payload off `stream`: the source's initial (possibly
/// partial) result.
///
/// When the payload's continuation flag announces patches to come, the rest
/// of the stream is handed to a [`Receiver`] seeded with the initial data;
/// the receiver is returned alongside the payload so it can be attached to
/// the composite object before any consumer sees it. `path_prefix` is the
/// number of leading response-path segments addressing the tree this
/// source's stream is rooted under.
pub async fn receive_initial(
    mut stream: ResponseStream,
    source: &Arc<Source>,
    path_prefix: usize,
) -> Result<(Response, Option<Arc<Receiver>>), FetchError> {
    let initial = stream
        .next()
        .await
        .ok_or_else(|| FetchError::SubrequestNoResponse {
            service: source.name.clone(),
        })?;

    if !initial.is_primary() {
        return Err(FetchError::SubrequestUnexpectedPatchResponse {
            service: source.name.clone(),
        });
    }

    let receiver = if initial.has_next == Some(true) {
        Some(Receiver::new(
            source.name.clone(),
            stream,
            initial.data.clone(),
            path_prefix,
        ))
    } else {
        None
    };

    Ok((initial, receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_ext::Path;
    use serde_json_bytes::json;
    use std::collections::HashMap;

    fn source() -> Arc<Source> {
        Arc::new(Source::new("accounts", HashMap::new()))
    }

    #[tokio::test]
    async fn a_complete_response_has_no_receiver() {
        let stream: ResponseStream = Response::builder().data(json!({"x": 1})).build().into();

        let (initial, receiver) = receive_initial(stream, &source(), 0).await.unwrap();
        assert_eq!(initial.data, json!({"x": 1}));
        assert!(receiver.is_none());
    }

    #[tokio::test]
    async fn an_incremental_response_gets_a_receiver() {
        let stream: ResponseStream = stream::iter(vec![
            Response::builder().has_next(true).build(),
            Response::builder()
                .data(json!({"test": "test"}))
                .path(Path::empty())
                .has_next(false)
                .build(),
        ])
        .boxed();

        let (initial, receiver) = receive_initial(stream, &source(), 0).await.unwrap();
        assert_eq!(initial.has_next, Some(true));
        let receiver = receiver.expect("the source announced more data");
        assert_eq!(
            receiver.request(&Path::from("test")).await,
            Some(json!("test"))
        );
    }

    #[tokio::test]
    async fn an_empty_stream_is_an_error() {
        let stream: ResponseStream = stream::iter(Vec::<Response>::new()).boxed();

        let result = receive_initial(stream, &source(), 0).await;
        assert!(matches!(
            result,
            Err(FetchError::SubrequestNoResponse { service }) if service == "accounts"
        ));
    }

    #[tokio::test]
    async fn a_leading_patch_is_rejected() {
        let stream: ResponseStream = Response::builder()
            .data(json!({}))
            .path(Path::empty())
            .build()
            .into();

        let result = receive_initial(stream, &source(), 0).await;
        assert!(matches!(
            result,
            Err(FetchError::SubrequestUnexpectedPatchResponse { .. })
        ));
    }
}
