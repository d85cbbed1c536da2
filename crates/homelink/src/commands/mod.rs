//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod login;
pub mod util;
pub mod values;
pub mod watch;
