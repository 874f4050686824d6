use notebook_auth::settings::*;

fn main() -> anyhow::Result<()> {
    // $ cargo run --bin settings_demo -- --settings=settings/dev.toml
    // $ NOTEBOOK__AUTH__ACCESS_TTL_SECS=60 cargo run --bin settings_demo
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:#?}", project_settings);
    println!(
        "access ttl: {:?}, refresh ttl: {:?}",
        project_settings.auth.access_ttl(),
        project_settings.auth.refresh_ttl()
    );

    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);
    Ok(())
}
