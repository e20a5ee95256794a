use crate::json_ext::Object;
use crate::json_ext::Path;
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Error types for delegation.
///
/// Note that these are not actually returned to the client, but are instead
/// converted to JSON for [`struct@Error`].
#[derive(ThisError, Display, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
#[ignore_extra_doc_attributes]
pub enum FetchError {
    /// Selection references unknown source '{service}'.
    ValidationUnknownSourceError {
        /// The source that was unknown.
        service: String,
    },

    /// Source '{service}' returned no response.
    SubrequestNoResponse {
        /// The source that returned no response.
        service: String,
    },

    /// Source '{service}' response was malformed: {reason}
    SubrequestMalformedResponse {
        /// The source that responded with the malformed response.
        service: String,

        /// The reason the payload was rejected.
        reason: String,
    },

    /// Source '{service}' returned a patch response which was not expected.
    SubrequestUnexpectedPatchResponse {
        /// The source that returned the patch response.
        service: String,
    },

    /// Fetch failed from '{service}': {reason}
    ///
    /// Note that this relates to a transport error and not a GraphQL error.
    SubrequestFetchError {
        /// The source that failed.
        service: String,

        /// The reason the fetch failed.
        reason: String,
    },

    /// Subquery requires field '{field}' but it was not found in the current response.
    ExecutionFieldNotFound {
        /// The field that is not found.
        field: String,
    },

    /// Invalid content: {reason}
    ExecutionInvalidContent { reason: String },

    /// Could not find path: {reason}
    ExecutionPathNotFound { reason: String },
}

impl FetchError {
    /// Convert the fetch error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> Error {
        let extensions = serde_json_bytes::to_value(self)
            .ok()
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_default();
        Error {
            message: self.to_string(),
            locations: Default::default(),
            path,
            extensions,
        }
    }
}

/// Any error.
#[derive(ThisError, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error from the originating request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// The path of the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional graphql extensions.
    #[serde(default, skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

impl Error {
    /// A copy of this error relocated to the given response path.
    pub fn relocated(&self, path: Path) -> Error {
        Error {
            path: Some(path),
            ..self.clone()
        }
    }
}

/// A location in the request that triggered a graphql error.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The line number.
    pub line: i32,

    /// The column number.
    pub column: i32,
}
