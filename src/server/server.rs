use crate::api::v1::RefreshCookie;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::settings::Settings;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub refresh_cookie: Arc<RefreshCookie>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;

        let (user_repo, session_repo, pool): (
            Arc<dyn UserRepo>,
            Arc<dyn SessionRepo>,
            Option<Pool<MySql>>,
        ) = match settings.storage.backend.as_str() {
            "memory" => {
                warn!("using in-memory storage, sessions are lost on restart");
                let user_repo: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new());
                let session_repo: Arc<dyn SessionRepo> = Arc::new(MemorySessionRepo::new());
                (user_repo, session_repo, None)
            }
            "mysql" => {
                let dsn = settings
                    .storage
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("storage.database_url is not set"))?;
                let pool = MySqlPoolOptions::new()
                    .max_connections(16)
                    .connect(dsn)
                    .await?;
                let user_repo: Arc<dyn UserRepo> = Arc::new(MySqlUserRepo::new(pool.clone()));
                let session_repo: Arc<dyn SessionRepo> =
                    Arc::new(MySqlSessionRepo::new(pool.clone()));
                (user_repo, session_repo, Some(pool))
            }
            other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        };

        let key = settings.auth.secret.clone().into_bytes();
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            access_ttl: settings.auth.access_ttl(),
            signing_key: key.clone(),
        }));
        let generator = Arc::new(RefreshTokenGenerator::new(key));
        let session_rotation = Arc::new(SessionRotation::new(
            session_repo,
            generator,
            token_codec.clone(),
            SessionRotationConfig {
                refresh_ttl: settings.auth.refresh_ttl(),
                max_attempts: settings.auth.max_token_attempts,
            },
        ));

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_codec,
            session_rotation,
        ));

        let refresh_cookie = Arc::new(RefreshCookie::new(
            settings.auth.refresh_ttl(),
            settings.auth.secure_cookie,
        ));

        info!(backend = %settings.storage.backend, "server started");

        Ok(Self {
            auth_service,
            refresh_cookie,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
