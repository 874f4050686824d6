mod auth_service_impl;
mod credential_hasher;
mod refresh_token_generator;
mod session_rotation;
mod token_codec_jwt;

pub use auth_service_impl::*;
pub use credential_hasher::*;
pub use refresh_token_generator::*;
pub use session_rotation::*;
pub use token_codec_jwt::*;
