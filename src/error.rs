use thiserror::Error;

/// A `json_ref` string that does not follow any supported grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed json_ref `{path}`: {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

/// Fatal configuration problems, raised while loading the fields configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("field `{field}`: malformed json_ref `{path}`: {reason}")]
    MalformedPath {
        field: String,
        path: String,
        reason: String,
    },

    #[error("field `{field}`: unknown matcher `{name}`")]
    UnknownMatcher { field: String, name: String },

    #[error("field `{field}`: unknown field type `{name}`")]
    UnknownFieldType { field: String, name: String },

    #[error("field `{field}`: invalid params for {matcher}: {reason}")]
    InvalidParams {
        field: String,
        matcher: String,
        reason: String,
    },

    #[error("field `{field}`: {reason}")]
    IncompatibleField { field: String, reason: String },
}

impl ConfigError {
    pub fn from_path_error(field: &str, error: PathError) -> Self {
        Self::MalformedPath {
            field: field.to_string(),
            path: error.path,
            reason: error.reason,
        }
    }
}

/// Row sets too large to align within the configured cell budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "alignment of {gold_rows} ground-truth rows against {predicted_rows} predicted rows exceeds the {limit}-cell limit"
)]
pub struct AlignmentOverflow {
    pub gold_rows: usize,
    pub predicted_rows: usize,
    pub limit: usize,
}
