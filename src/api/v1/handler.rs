use super::cookie::RefreshCookie;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::header::SET_COOKIE;
use warp::http::{HeaderValue, StatusCode};
use warp::reply::Response;
use warp::{Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn json_reply<T: Serialize>(body: &ApiResponse<T>, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(code: ApiErrorCode) -> Response {
    json_reply(&ApiResponse::<()>::err(code, code.to_string()), code.status())
}

fn with_cookie(mut response: Response, cookie: String) -> Response {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("refresh cookie is not a valid header value: {}", e),
    }
    response
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, warp::Rejection> {
    let register_input = RegisterInput {
        email: body.email,
        password: body.password,
        name: body.name,
    };
    let user_id = auth_service
        .register(register_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(json_reply(
        &ApiResponse::ok(RegisterResponse { user_id }),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    refresh_cookie: Arc<RefreshCookie>,
) -> Result<Response, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let tokens = login_result.tokens;
    let login_response = LoginResponse {
        user_id: login_result.user_id,
        access_token: tokens.access_token,
        access_token_expires_at: tokens.access_token_expires_at,
    };
    let response = json_reply(&ApiResponse::ok(login_response), StatusCode::OK);
    Ok(with_cookie(
        response,
        refresh_cookie.issue(&tokens.refresh_token),
    ))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Rotates the refresh cookie. Any failure clears it so the client has to log in again.
pub async fn refresh(
    cookie: Option<String>,
    auth_service: Arc<dyn AuthService>,
    refresh_cookie: Arc<RefreshCookie>,
) -> Result<Response, warp::Rejection> {
    let Some(token) = cookie.filter(|t| !t.is_empty()) else {
        return Ok(with_cookie(
            error_reply(ApiErrorCode::InvalidToken),
            refresh_cookie.clear(),
        ));
    };

    match auth_service.refresh(&token).await {
        Ok(tokens) => {
            let refresh_response = RefreshResponse {
                access_token: tokens.access_token,
                access_token_expires_at: tokens.access_token_expires_at,
            };
            let response = json_reply(&ApiResponse::ok(refresh_response), StatusCode::OK);
            Ok(with_cookie(
                response,
                refresh_cookie.issue(&tokens.refresh_token),
            ))
        }
        Err(e) => Ok(with_cookie(
            error_reply(ApiErrorCode::from(e)),
            refresh_cookie.clear(),
        )),
    }
}

/// Revokes the session behind the refresh cookie. The cookie is cleared whatever the outcome.
pub async fn logout(
    cookie: Option<String>,
    auth_service: Arc<dyn AuthService>,
    refresh_cookie: Arc<RefreshCookie>,
) -> Result<Response, warp::Rejection> {
    let response = match cookie.filter(|t| !t.is_empty()) {
        None => error_reply(ApiErrorCode::InvalidToken),
        Some(token) => match auth_service.logout(&token).await {
            Ok(()) => warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT)
                .into_response(),
            Err(e) => error_reply(ApiErrorCode::from(e)),
        },
    };
    Ok(with_cookie(response, refresh_cookie.clear()))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
}

pub async fn me(user_id: UserId) -> Result<Response, warp::Rejection> {
    Ok(json_reply(
        &ApiResponse::ok(MeResponse { user_id }),
        StatusCode::OK,
    ))
}
