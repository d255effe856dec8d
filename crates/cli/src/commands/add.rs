// `anggar add <doc>` — append a category, work item, or sub-item row.

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddKindArg {
    /// Grouping header numbered with roman numerals.
    Category,
    /// Priced line of work under the current category.
    WorkItem,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Document id.
    pub doc: Uuid,

    /// Row kind to append at the end of the sheet.
    #[arg(long, value_enum)]
    kind: Option<AddKindArg>,

    /// Insert a sub-item below this work item instead.
    #[arg(long, value_name = "ITEM")]
    parent: Option<Uuid>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResult {
    pub item_id: Uuid,
}

pub fn run(args: AddArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    if args.kind.is_none() && args.parent.is_none() {
        bail!("either --kind or --parent is required");
    }

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_add(args.doc, args.kind, args.parent)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_add(args.doc, args.kind, args.parent))
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

async fn call_add(
    doc: Uuid,
    kind: Option<AddKindArg>,
    parent: Option<Uuid>,
) -> anyhow::Result<AddResult> {
    let client = daemon_launcher::connected_client().await?;

    let mut params = json!({ "id": doc });
    if let Some(kind) = kind {
        params["kind"] = json!(kind);
    }
    if let Some(parent) = parent {
        params["parent_id"] = json!(parent);
    }

    client
        .call(methods::ITEM_ADD, params)
        .await
        .context("item.add request failed")
}

fn format_human(result: &AddResult) -> String {
    format!(
        "Added row {}. Fill it in with `anggar edit`.",
        result.item_id
    )
}
