// `anggar move <doc> <item> <direction>` — reorder a row within its block.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionArg {
    Up,
    Down,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Document id.
    pub doc: Uuid,

    /// Row id to move.
    pub item: Uuid,

    /// Direction within the row's sibling block.
    #[arg(value_enum)]
    pub direction: DirectionArg,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResult {
    pub moved: bool,
}

pub fn run(args: MoveArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_move(args.doc, args.item, args.direction)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_move(args.doc, args.item, args.direction))
        });

    match rt {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn call_move(doc: Uuid, item: Uuid, direction: DirectionArg) -> anyhow::Result<MoveResult> {
    let client = daemon_launcher::connected_client().await?;
    client
        .call(
            methods::ITEM_MOVE,
            json!({
                "id": doc,
                "item_id": item,
                "direction": direction,
            }),
        )
        .await
        .context("item.move request failed")
}

fn format_human(result: &MoveResult) -> String {
    if result.moved {
        "Row moved.".into()
    } else {
        "Row is already at the edge of its block.".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_format_reports_both_outcomes() {
        assert_eq!(format_human(&MoveResult { moved: true }), "Row moved.");
        assert!(format_human(&MoveResult { moved: false }).contains("edge of its block"));
    }

    #[test]
    fn json_format_roundtrips() {
        let result = MoveResult { moved: true };
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, format_human).unwrap();
        let parsed: MoveResult = serde_json::from_slice(&buf).unwrap();
        assert!(parsed.moved);
    }
}
