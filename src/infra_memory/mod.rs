//! Process-local backends for the storage ports. Used by the `memory` storage
//! backend and by the test suite.

mod session_repo_memory;
mod user_repo_memory;

pub use session_repo_memory::*;
pub use user_repo_memory::*;
