use actix_web::{http::StatusCode, HttpResponse};
use derive_more::Display;
use serde_json::json;

#[derive(Debug, Display)]
pub enum ServerError {
    DieselError,
    EnvironmentError,
    R2D2Error,
    JWTError,
    ArgonError,
    BlockingError,
    /// A pin-group changed under a unit of work; the unit may be retried.
    GroupConflict,
    Unauthorized,
    #[display(fmt = "email already registered")]
    EmailTaken,
    #[display(fmt = "{}", _0)]
    InvalidArgument(String),
    #[display(fmt = "note id: {} was not found", _0)]
    NotFound(String),
}

impl From<r2d2::Error> for ServerError {
    fn from(e: r2d2::Error) -> ServerError {
        log::error!("{e}");
        ServerError::R2D2Error
    }
}

impl From<std::env::VarError> for ServerError {
    fn from(_: std::env::VarError) -> ServerError {
        ServerError::EnvironmentError
    }
}

impl From<diesel::result::Error> for ServerError {
    fn from(e: diesel::result::Error) -> ServerError {
        use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error};

        match e {
            Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                ServerError::GroupConflict
            }
            // diesel has no kind for SQLSTATE 40P01 and does not expose the
            // code, so this matches PostgreSQL's "deadlock detected" message
            Error::DatabaseError(_, ref info)
                if info.message().starts_with("deadlock detected") =>
            {
                ServerError::GroupConflict
            }
            _ => {
                log::error!("{e}");
                ServerError::DieselError
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ServerError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        log::error!("{e}");
        ServerError::JWTError
    }
}

impl From<argon2::password_hash::Error> for ServerError {
    fn from(e: argon2::password_hash::Error) -> Self {
        log::error!("{e}");
        ServerError::ArgonError
    }
}

impl From<actix_web::error::BlockingError> for ServerError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        log::error!("{e}");
        ServerError::BlockingError
    }
}

impl actix_web::error::ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::EmailTaken => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServerError::Unauthorized => {
                HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" }))
            }
            ServerError::InvalidArgument(msg) => {
                HttpResponse::BadRequest().json(json!({ "error": msg }))
            }
            ServerError::NotFound(_) => {
                HttpResponse::NotFound().json(json!({ "error": "Note not found" }))
            }
            ServerError::EmailTaken => {
                HttpResponse::Conflict().json(json!({ "error": self.to_string() }))
            }
            _ => {
                log::error!("request failed: {self}");
                HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
            }
        }
    }
}
