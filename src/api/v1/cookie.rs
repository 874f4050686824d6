use crate::application_port::RefreshToken;
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};
use std::time::Duration;

pub const REFRESH_COOKIE: &str = "refresh_token";
/// The refresh secret is only ever sent back to the auth endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Builds `Set-Cookie` values for the refresh secret.
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    max_age: Duration,
    secure: bool,
}

impl RefreshCookie {
    pub fn new(max_age: Duration, secure: bool) -> Self {
        Self { max_age, secure }
    }

    pub fn issue(&self, token: &RefreshToken) -> String {
        let max_age = CookieDuration::try_from(self.max_age).unwrap_or(CookieDuration::MAX);
        self.build(token.0.clone(), max_age).to_string()
    }

    pub fn clear(&self) -> String {
        self.build(String::new(), CookieDuration::ZERO).to_string()
    }

    fn build(&self, value: String, max_age: CookieDuration) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, value))
            .path(REFRESH_COOKIE_PATH)
            .max_age(max_age)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}
