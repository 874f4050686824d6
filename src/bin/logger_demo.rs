use notebook_auth::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    debug!("bootstrap debug log (hidden at the default filter)");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    debug!(user_id = 42, "session rotated");
    info!("application info log");

    let bad = LogConfig {
        filter: "not a [valid filter".to_string(),
    };
    println!("invalid filter rejected: {}", logger.reload_from_config(&bad).is_err());

    Ok(())
}
