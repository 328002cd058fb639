use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid channel name")]
    InvalidChannelName,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("request must set exactly one of 'playlist' or 'command'")]
    AmbiguousCommandRequest,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("channel has no active stream")]
    NoActiveStreamer,

    #[error("Channel not active")]
    ChannelNotActive,

    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidChannelName
            | AppError::MissingField(_)
            | AppError::AmbiguousCommandRequest
            | AppError::UnknownCommand(_)
            | AppError::ChannelNotActive
            | AppError::Serialization(_) => StatusCode::BAD_REQUEST,
            AppError::NoActiveStreamer => StatusCode::CONFLICT,
            AppError::Io(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
