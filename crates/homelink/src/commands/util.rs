//! Shared helpers for command handlers.

use std::sync::Arc;

use homelink_core::{ControllerConfig, CoreError, PointId, TransportChannel};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Resolved controller settings plus the process-wide transport channel.
pub struct Connection {
    pub config: ControllerConfig,
    pub channel: Arc<TransportChannel>,
}

/// Resolve configuration and obtain the shared channel. No request is made yet.
pub fn connect(global: &GlobalOpts) -> Result<Connection, CliError> {
    let config = config::build_controller_config(global)?;
    let channel = TransportChannel::shared(config.transport_config()).map_err(CoreError::from)?;
    tracing::debug!(
        controller = %config.url,
        user = %config.credentials.username,
        "connection resolved"
    );
    Ok(Connection { config, channel })
}

pub fn point_ids(raw: &[u32]) -> Vec<PointId> {
    raw.iter().copied().map(PointId::new).collect()
}
