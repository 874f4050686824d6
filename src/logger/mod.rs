//! Logging setup. `bin/logger_demo.rs` exercises the filter reload by hand.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
