use crate::application_port::{AccessToken, AuthError, TokenCodec};
use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String, // user id as string
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&cfg.signing_key);
        let decoding_key = DecodingKey::from_secret(&cfg.signing_key);
        JwtHs256Codec {
            cfg,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token as of `now`.
    ///
    /// `iat` and `exp` are whole seconds: `iat` is `now` truncated and `exp` is
    /// `iat + access_ttl`. A token issued at a fractional instant therefore stops
    /// verifying up to one second before `now + access_ttl`. The returned expiry
    /// is the truncated `exp`, which is the instant verification starts failing.
    pub fn issue_access_token_at(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat = now.timestamp();
        let exp = iat + self.cfg.access_ttl.as_secs() as i64;
        let claims = AccessClaims {
            sub: user.to_string(),
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let exp_dt = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError("access expiry out of range".to_string()))?;
        Ok((AccessToken(token), exp_dt))
    }

    /// Verify a token as of `now`. Expired means `now >= exp`, with no leeway.
    pub fn verify_access_token_at(
        &self,
        token: &AccessToken,
        now: DateTime<Utc>,
    ) -> Result<UserId, AuthError> {
        // HS256 only; a header naming any other algorithm is rejected by decode.
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = false;
        v.leeway = 0;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);

        let data = decode::<AccessClaims>(&token.0, &self.decoding_key, &v)
            .map_err(|_| AuthError::TokenInvalid)?;
        if now.timestamp() >= data.claims.exp {
            return Err(AuthError::TokenInvalid);
        }
        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::TokenInvalid)
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access_token(&self, user: UserId) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        self.issue_access_token_at(user, Utc::now())
    }

    fn verify_access_token(&self, token: &AccessToken) -> Result<UserId, AuthError> {
        self.verify_access_token_at(token, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TTL_SECS: u64 = 15 * 60;

    fn codec_with_key(key: &[u8]) -> JwtHs256Codec {
        JwtHs256Codec::new(JwtConfig {
            issuer: "notebook.auth".to_string(),
            audience: "notebook-client".to_string(),
            access_ttl: Duration::from_secs(TTL_SECS),
            signing_key: key.to_vec(),
        })
    }

    fn codec() -> JwtHs256Codec {
        codec_with_key(b"unit-test-signing-key")
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn is_invalid(result: Result<UserId, AuthError>) -> bool {
        matches!(result, Err(AuthError::TokenInvalid))
    }

    #[test]
    fn verifies_until_just_before_expiry() {
        let codec = codec();
        let t = issued_at();
        let (token, expires_at) = codec.issue_access_token_at(UserId(42), t).unwrap();
        assert_eq!(expires_at, t + chrono::Duration::seconds(TTL_SECS as i64));

        assert_eq!(codec.verify_access_token_at(&token, t).unwrap(), UserId(42));
        let just_before = expires_at - chrono::Duration::milliseconds(1);
        assert_eq!(
            codec.verify_access_token_at(&token, just_before).unwrap(),
            UserId(42)
        );
    }

    #[test]
    fn fails_at_and_after_expiry() {
        let codec = codec();
        let t = issued_at();
        let (token, expires_at) = codec.issue_access_token_at(UserId(42), t).unwrap();

        assert!(is_invalid(codec.verify_access_token_at(&token, expires_at)));
        assert!(is_invalid(
            codec.verify_access_token_at(&token, expires_at + chrono::Duration::days(1))
        ));
    }

    #[test]
    fn fractional_issue_instant_expires_on_the_whole_second() {
        let codec = codec();
        let t = issued_at() + chrono::Duration::milliseconds(900);
        let (token, expires_at) = codec.issue_access_token_at(UserId(42), t).unwrap();
        assert_eq!(
            expires_at,
            issued_at() + chrono::Duration::seconds(TTL_SECS as i64)
        );

        let before_truncated_exp = expires_at - chrono::Duration::milliseconds(100);
        assert_eq!(
            codec
                .verify_access_token_at(&token, before_truncated_exp)
                .unwrap(),
            UserId(42)
        );
        // Still short of t + ttl, but past the truncated exp.
        let inside_nominal_window = expires_at + chrono::Duration::milliseconds(700);
        assert!(inside_nominal_window < t + chrono::Duration::seconds(TTL_SECS as i64));
        assert!(is_invalid(
            codec.verify_access_token_at(&token, inside_nominal_window)
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_key() {
        let (token, _) = codec_with_key(b"another-key")
            .issue_access_token_at(UserId(1), Utc::now())
            .unwrap();
        assert!(is_invalid(codec().verify_access_token(&token)));
    }

    #[test]
    fn rejects_algorithm_substitution() {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "1".to_string(),
            exp: now + 600,
            iat: now,
            iss: "notebook.auth".to_string(),
            aud: "notebook-client".to_string(),
            jti: "jti".to_string(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"unit-test-signing-key"),
        )
        .unwrap();
        assert!(is_invalid(codec().verify_access_token(&AccessToken(forged))));
    }

    #[test]
    fn rejects_tampered_and_garbage_tokens() {
        let codec = codec();
        let (token, _) = codec.issue_access_token(UserId(9)).unwrap();
        let mut tampered = token.0.clone();
        tampered.push('x');

        assert!(is_invalid(codec.verify_access_token(&AccessToken(tampered))));
        assert!(is_invalid(
            codec.verify_access_token(&AccessToken("not.a.jwt".to_string()))
        ));
        assert!(is_invalid(codec.verify_access_token(&AccessToken(String::new()))));
    }

    #[test]
    fn rejects_non_numeric_subject() {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "alice".to_string(),
            exp: now + 600,
            iat: now,
            iss: "notebook.auth".to_string(),
            aud: "notebook-client".to_string(),
            jti: "jti".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"unit-test-signing-key"),
        )
        .unwrap();
        assert!(is_invalid(codec().verify_access_token(&AccessToken(token))));
    }
}
