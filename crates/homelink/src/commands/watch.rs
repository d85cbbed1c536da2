//! `homelink watch`: stream value changes until Ctrl-C or `--count`.

use futures_util::StreamExt;
use tracing::{debug, info};

use homelink_core::{CancellationToken, SessionManager, SubscriptionEngine, ValueChangeEvent};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::util::{self, Connection};
use crate::error::CliError;
use crate::output;

fn render_event(event: &ValueChangeEvent, format: OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Table => {
            let id = event.point_id.to_string();
            let value = event.value.to_string();
            format!(
                "{}  {id:>6}  {value:<16} {}",
                event.received_at.format("%H:%M:%S%.3f"),
                output::freshness(event.is_live, color),
            )
        }
        OutputFormat::Plain => format!("{}\t{}", event.point_id, event.value),
        // One object per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(event).trim_end()),
    }
}

pub async fn handle(
    args: WatchArgs,
    conn: Connection,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut config = conn.config;
    if let Some(secs) = args.wait_timeout {
        config.subscription.wait_timeout = homelink_config::seconds("wait_timeout", secs)?;
    }

    let session = SessionManager::from_config(&config, conn.channel);
    session.authenticate().await?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, closing subscription");
                cancel.cancel();
            }
        }
    });

    let engine = SubscriptionEngine::new(session.clone(), config.subscription);
    let mut stream = engine.stream_changes(util::point_ids(&args.ids), cancel.clone());
    info!(points = args.ids.len(), "watching for value changes");

    let color = output::should_color(global.color);
    let mut seen = 0_usize;
    let mut failure = None;

    // Drain to the end so the subscription is torn down before logout.
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                if args.count.is_some_and(|limit| seen >= limit) {
                    continue;
                }
                output::print_output(&render_event(&event, global.output, color), global.quiet);
                seen += 1;
                if args.count.is_some_and(|limit| seen >= limit) {
                    cancel.cancel();
                }
            }
            Err(err) => failure = Some(err),
        }
    }

    interrupt.abort();
    session.disconnect().await;
    debug!(events = seen, "watch finished");

    failure.map_or(Ok(()), |err| Err(err.into()))
}
