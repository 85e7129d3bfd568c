/// Failures while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown command method: {0}")]
    UnknownMethod(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}
