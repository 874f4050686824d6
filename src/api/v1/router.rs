use super::cookie::REFRESH_COOKIE;
use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::UserId;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Paths are matched before methods so an unknown path rejects as not found
/// rather than method-not-allowed.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(server.refresh_cookie.clone()))
        .and_then(handler::login);

    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(server.refresh_cookie.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(server.refresh_cookie.clone()))
        .and_then(handler::logout);

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::me);

    register.or(login).or(refresh).or(logout).or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Resolves `Authorization: Bearer <token>` to the caller's user id.
fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        move |header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let Some(token) = header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) else {
                    return Err(reject::custom(ApiErrorCode::MalformedToken));
                };
                let user_id = auth_service
                    .verify_token(token.trim())
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(user_id)
            }
        },
    )
}
