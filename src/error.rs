use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The taxonomy of failures an [`crate::engine::Engine`] operation can surface.
///
/// `InvalidArgument` is only ever raised by the HTTP layer's own validation
/// (it should never escape an `Engine` call reached through that layer), but
/// the variant exists here so in-process callers (tests, other embedders) get
/// the same error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found")]
    NotFound,

    #[error("job does not belong to this queue")]
    WrongQueue,

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidArgument(msg.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            EngineError::InvalidArgument(m) => (StatusCode::BAD_REQUEST, m.clone()),
            EngineError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            EngineError::WrongQueue => {
                tracing::error!(error = %self, "wrong-queue push reached the HTTP boundary");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            },
            EngineError::Store(_) | EngineError::Codec(_) => {
                tracing::error!(error = %self, "internal error servicing request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            },
        };

        (status, axum::Json(ErrorBody { error: msg })).into_response()
    }
}
