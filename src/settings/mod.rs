//! Settings are read from a TOML file and overlaid with `NOTEBOOK__*` environment
//! variables. See `bin/settings_demo.rs` for a binary that prints what gets loaded.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
