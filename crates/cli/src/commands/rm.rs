// `anggar rm <doc> <item>` — toggle a row's soft-delete flag.

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Document id.
    pub doc: Uuid,

    /// Row id to mark deleted (or restore).
    pub item: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmResult {
    pub deleted: bool,
}

pub fn run(args: RmArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_rm(args.doc, args.item)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_rm(args.doc, args.item))
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

async fn call_rm(doc: Uuid, item: Uuid) -> anyhow::Result<RmResult> {
    let client = daemon_launcher::connected_client().await?;
    client
        .call(
            methods::ITEM_TOGGLE_DELETE,
            json!({ "id": doc, "item_id": item }),
        )
        .await
        .context("item.toggle_delete request failed")
}

fn format_human(result: &RmResult) -> String {
    if result.deleted {
        "Row marked deleted; it drops out on the next save. Run `anggar rm` again to restore."
            .into()
    } else {
        "Row restored.".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_format_reports_both_directions() {
        assert!(format_human(&RmResult { deleted: true }).contains("marked deleted"));
        assert_eq!(format_human(&RmResult { deleted: false }), "Row restored.");
    }

    #[test]
    fn json_format_roundtrips() {
        let result = RmResult { deleted: true };
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, format_human).unwrap();
        let parsed: RmResult = serde_json::from_slice(&buf).unwrap();
        assert!(parsed.deleted);
    }
}
