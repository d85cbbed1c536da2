//! `homelink values get|set`.

use tabled::Tabled;

use homelink_core::{PointId, PointValue, PointValueRecord, SessionManager};

use crate::cli::{GlobalOpts, ValuesArgs, ValuesCommand};
use crate::commands::util::{self, Connection};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "ID")]
    id: PointId,
    #[tabled(rename = "Value")]
    value: PointValue,
    #[tabled(rename = "Type")]
    kind: &'static str,
}

fn kind(value: &PointValue) -> &'static str {
    match value {
        PointValue::Bool(_) => "bool",
        PointValue::Integer(_) => "integer",
        PointValue::Float(_) => "float",
        PointValue::Text(_) => "text",
    }
}

fn row(r: &PointValueRecord) -> ValueRow {
    ValueRow {
        id: r.id,
        value: r.value.clone(),
        kind: kind(&r.value),
    }
}

fn parse_value(raw: &str, as_text: bool) -> PointValue {
    if as_text {
        return PointValue::Text(raw.to_owned());
    }
    let Ok(value) = raw.parse::<PointValue>();
    value
}

pub async fn handle(
    args: ValuesArgs,
    conn: Connection,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Connection { config, channel } = conn;
    let session = SessionManager::from_config(&config, channel);

    match args.command {
        ValuesCommand::Get { ids } => {
            let ids = util::point_ids(&ids);
            let values = session
                .run_once(move |session| async move { session.read_values(&ids).await })
                .await?;

            let out = output::render_list(global.output, &values, row, |r| {
                format!("{}\t{}", r.id, r.value)
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ValuesCommand::Set { id, value, text } => {
            let record = PointValueRecord {
                id: PointId::new(id),
                value: parse_value(&value, text),
            };
            let shown = record.value.clone();
            session
                .run_once(move |session| async move { session.write_values(&[record]).await })
                .await?;

            if !global.quiet {
                eprintln!("✓ Point {id} set to {shown}");
            }
            Ok(())
        }
    }
}
