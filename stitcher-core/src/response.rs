use crate::error::Error;
use crate::json_ext::Object;
use crate::json_ext::Path;
use futures::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;
use std::pin::Pin;
use typed_builder::TypedBuilder;

/// A source response stream consists of one primary response and any number
/// of patch responses.
pub type ResponseStream = Pin<Box<dyn futures::Stream<Item = Response> + Send>>;

/// A graphql response payload.
///
/// Both a source's primary (initial) payload and every subsequent patch use
/// this shape; a patch carries the `path` its data should be merged at and
/// the `has_next` continuation flag.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(setter(into)))]
pub struct Response {
    /// The label that was passed to the defer directive for this patch.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub label: Option<String>,

    /// The response data.
    #[serde(skip_serializing_if = "skip_data_if", default)]
    #[builder(default = Value::Object(Default::default()))]
    pub data: Value,

    /// The path that the data should be merged at.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub path: Option<Path>,

    /// The optional indicator that there may be more data in the form of a
    /// patch response.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub has_next: Option<bool>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[builder(default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    #[builder(default)]
    pub extensions: Object,
}

fn skip_data_if(value: &Value) -> bool {
    match value {
        Value::Object(o) => o.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

impl Response {
    pub fn is_primary(&self) -> bool {
        self.path.is_none()
    }
}

impl From<Response> for ResponseStream {
    fn from(response: Response) -> Self {
        stream::once(future::ready(response)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json_bytes::json;

    #[test]
    fn test_patch_response() {
        let response = serde_json::from_str::<Response>(
            serde_json::json!({
                "label": "part",
                "hasNext": false,
                "path": ["object"],
                "data": {
                    "field1": "field1",
                    "field2": "field2",
                },
            })
            .to_string()
            .as_str(),
        )
        .unwrap();

        assert_eq!(
            response,
            Response::builder()
                .label("part".to_string())
                .data(json!({"field1": "field1", "field2": "field2"}))
                .path(Path::from("object"))
                .has_next(false)
                .build()
        );
        assert!(!response.is_primary());
    }
}
