use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    // provider answered but nothing usable came out of it
    #[error("{0}")]
    BadGateway(String),

    // upstream status relayed back as-is once the proxy already talked to it
    #[error("Upstream error: {}", .0.as_u16())]
    Upstream(StatusCode),

    #[error("Proxy error: {0}")]
    ProxyFailure(String),

    #[error("internal server error")]
    InternalServerError,

    #[error("{0}")]
    InternalServerErrorWithContext(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Error::Upstream(status) => *status,
            Error::ProxyFailure(_)
            | Error::InternalServerError
            | Error::InternalServerErrorWithContext(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            // these two happen after the upstream call so the player gets plain text like the
            // upstream would have sent
            Error::Upstream(_) | Error::ProxyFailure(_) => {
                error!("proxy failed with {}: {}", status, self);
                (status, self.to_string()).into_response()
            }
            _ => {
                if status.is_server_error() {
                    error!("request failed with {}: {}", status, self);
                }
                let body = ErrorBody {
                    status: "error",
                    message: self.to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}
