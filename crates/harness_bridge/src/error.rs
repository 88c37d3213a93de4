use std::path::PathBuf;

use thiserror::Error;

/// Machine-readable classification of a dropped input line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeErrorCode {
    JsonParse,
    LineTooLong,
    Schema,
}

/// Non-fatal, per-line decode failure. The line is dropped and decoding continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("line {line_number}: invalid JSON: {message}")]
    Json { line_number: usize, message: String },
    #[error("line {line_number}: line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

impl DecodeError {
    pub fn code(&self) -> DecodeErrorCode {
        match self {
            DecodeError::Json { .. } => DecodeErrorCode::JsonParse,
            DecodeError::LineTooLong { .. } => DecodeErrorCode::LineTooLong,
        }
    }

    pub fn line_number(&self) -> usize {
        match self {
            DecodeError::Json { line_number, .. } | DecodeError::LineTooLong { line_number, .. } => {
                *line_number
            }
        }
    }
}

/// Rejection produced by an [`crate::EventValidator`] for well-formed JSON that does not
/// match a known event shape.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("event is not a JSON object")]
    NotAnObject,
    #[error("event has no string `{field}` discriminator")]
    MissingDiscriminator { field: String },
    #[error("unknown event kind `{kind}`")]
    UnknownKind { kind: String },
    #[error("event kind `{kind}` is missing required field `{field}`")]
    MissingField { kind: String, field: String },
    #[error("event does not match its declared shape: {message}")]
    Deserialize { message: String },
}

impl SchemaError {
    pub fn code(&self) -> DecodeErrorCode {
        DecodeErrorCode::Schema
    }

    /// Summary safe to log: never echoes payload content.
    pub fn redacted_summary(&self) -> String {
        match self {
            SchemaError::NotAnObject => "event is not a JSON object".to_string(),
            SchemaError::MissingDiscriminator { field } => format!("missing `{field}`"),
            SchemaError::UnknownKind { .. } => "unknown event kind".to_string(),
            SchemaError::MissingField { kind, field } => {
                format!("`{kind}` missing `{field}`")
            }
            SchemaError::Deserialize { .. } => "event shape mismatch".to_string(),
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Deserialize {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid harness configuration: {source}")]
    Config {
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to read harness config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed reading harness output: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a guarded prompt: either the guard refused to start, or the work itself failed.
#[derive(Debug, Error)]
pub enum PromptError<E> {
    #[error("a prompt is already in progress for this harness")]
    InProgress,
    #[error(transparent)]
    Work(E),
}

impl<E> PromptError<E> {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, PromptError::InProgress)
    }

    pub fn into_work(self) -> Option<E> {
        match self {
            PromptError::InProgress => None,
            PromptError::Work(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_carry_code_and_line() {
        let json = DecodeError::Json {
            line_number: 3,
            message: "expected value".to_string(),
        };
        assert_eq!(json.code(), DecodeErrorCode::JsonParse);
        assert_eq!(json.line_number(), 3);
        assert_eq!(json.to_string(), "line 3: invalid JSON: expected value");

        let too_long = DecodeError::LineTooLong {
            line_number: 9,
            observed_bytes: 70,
            max_line_bytes: 64,
        };
        assert_eq!(too_long.code(), DecodeErrorCode::LineTooLong);
        assert_eq!(too_long.line_number(), 9);
    }

    #[test]
    fn redacted_summary_omits_payload_values() {
        let err = SchemaError::UnknownKind {
            kind: "secret-token-123".to_string(),
        };
        assert_eq!(err.code(), DecodeErrorCode::Schema);
        assert!(!err.redacted_summary().contains("secret-token-123"));
        assert!(err.to_string().contains("secret-token-123"));

        let err = SchemaError::from(serde_json::from_str::<u8>("\"x\"").unwrap_err());
        assert_eq!(err.redacted_summary(), "event shape mismatch");
    }
}
