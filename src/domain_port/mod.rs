// repo

mod session_repo;
mod user_repo;

mod repo_tx;

pub use session_repo::*;
pub use user_repo::*;

pub use repo_tx::*;
