use super::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Notebook authentication service")]
pub struct Cli {
    /// Path to a TOML settings file. Defaults to `settings/dev.toml` in debug builds.
    #[arg(long)]
    pub settings: Option<String>,
}
