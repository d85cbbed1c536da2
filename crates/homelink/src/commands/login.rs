//! `homelink login`: verify credentials by opening and closing a session.

use homelink_core::{SessionInfo, SessionManager};

use crate::cli::GlobalOpts;
use crate::commands::util::Connection;
use crate::error::CliError;
use crate::output;

fn detail(info: &SessionInfo) -> String {
    [
        format!("Controller:  {}", info.endpoint),
        format!("User:        {}", info.username),
        format!("Role:        {}", info.role),
        format!("Logged in:   {}", info.authenticated_at.to_rfc3339()),
    ]
    .join("\n")
}

pub async fn handle(conn: Connection, global: &GlobalOpts) -> Result<(), CliError> {
    let session = SessionManager::from_config(&conn.config, conn.channel);

    let info = session.authenticate().await?;
    if !session.disconnect().await {
        tracing::warn!("logout was not confirmed by the controller");
    }

    let out = output::render_single(global.output, &info, detail, |i| i.username.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
