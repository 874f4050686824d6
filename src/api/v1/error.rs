use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use crate::logger::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
    {
        ApiErrorCode::InvalidInput
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::MethodNotAllowed
    } else {
        warn!("Unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Authorization header is missing or malformed")]
    MalformedToken,
    #[error("Request is malformed or failed validation")]
    InvalidInput,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::MalformedToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::UserExists => ApiErrorCode::EmailTaken,
            AuthError::TokenInvalid => ApiErrorCode::InvalidToken,
            AuthError::TokenMalformed => ApiErrorCode::MalformedToken,
            AuthError::Validation(reason) => {
                debug!("rejected input: {}", reason);
                ApiErrorCode::InvalidInput
            }
            // Already logged where the attempts ran out.
            AuthError::TokenAllocationExhausted => ApiErrorCode::InternalError,
            AuthError::Store(e) => ApiErrorCode::internal(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
