// `anggar save <doc>` — persist the sheet, dropping soft-deleted rows.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Document id.
    pub doc: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResult {
    pub removed: usize,
    pub updated_at: DateTime<Utc>,
}

pub fn run(args: SaveArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_save(args.doc)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_save(args.doc))
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

async fn call_save(doc: Uuid) -> anyhow::Result<SaveResult> {
    let client = daemon_launcher::connected_client().await?;
    client
        .call(methods::DOC_SAVE, json!({ "id": doc }))
        .await
        .context("doc.save request failed")
}

fn format_human(result: &SaveResult) -> String {
    if result.removed > 0 {
        format!("Saved; {} deleted row(s) dropped.", result.removed)
    } else {
        "Saved.".into()
    }
}
