use notebook_auth::api;
use notebook_auth::logger::*;
use notebook_auth::server::*;
use notebook_auth::settings::*;
use std::fs;
use std::sync::Arc;
use tokio::signal;
use warp::Filter;

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("could not listen for SIGINT: {}", e);
    }
}

fn ensure_regular_file(path: &str, what: &str) -> anyhow::Result<()> {
    if !fs::metadata(path)?.is_file() {
        return Err(anyhow::anyhow!("TLS {} is not a regular file: {:?}", what, path));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let address: std::net::SocketAddr = project_settings.http.address.parse()?;
    if let Some(tls) = &project_settings.http.tls {
        ensure_regular_file(&tls.cert_path, "cert")?;
        ensure_regular_file(&tls.key_path, "key")?;
    }

    let server = Arc::new(Server::try_new(&project_settings).await?);

    let api_v1 = warp::path("api")
        .and(warp::path("v1"))
        .and(api::v1::routes(server.clone()))
        .recover(api::v1::recover_error)
        .with(warp::trace::request());

    match &project_settings.http.tls {
        Some(tls) => {
            let (bound, serving) = warp::serve(api_v1)
                .tls()
                .cert_path(&tls.cert_path)
                .key_path(&tls.key_path)
                .bind_with_graceful_shutdown(address, shutdown_signal());
            info!(%bound, "listening with TLS");
            serving.await;
        }
        None => {
            let (bound, serving) =
                warp::serve(api_v1).try_bind_with_graceful_shutdown(address, shutdown_signal())?;
            info!(%bound, "listening");
            serving.await;
        }
    }

    let shutdown_timeout = std::time::Duration::from_secs(100);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    Ok(())
}
