//! Persistence for the conversation log and the API error log.
//!
//! Both live under `<project>/.agent/`: `history.json` holds the message log
//! as one JSON array, `errors.log` accumulates rejected request bodies.

mod error;
mod error_log;
mod paths;
mod store;

pub use error::SessionStoreError;
pub use error_log::{ErrorLog, ERROR_LOG_TAIL, RULE};
pub use paths::{error_log_path, history_path, state_root, ERROR_LOG_FILE, HISTORY_FILE, STATE_DIR};
pub use store::SessionStore;
