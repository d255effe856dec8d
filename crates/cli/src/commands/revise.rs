// `anggar revise <doc>` — snapshot a locked sheet and reopen it.

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ReviseArgs {
    /// Document id.
    pub doc: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviseResult {
    pub number: u32,
    pub label: String,
}

pub fn run(args: ReviseArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_revise(args.doc)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_revise(args.doc))
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

async fn call_revise(doc: Uuid) -> anyhow::Result<ReviseResult> {
    let client = daemon_launcher::connected_client().await?;
    client
        .call(methods::DOC_REVISION_START, json!({ "id": doc }))
        .await
        .context("doc.revision.start request failed")
}

fn format_human(result: &ReviseResult) -> String {
    format!(
        "Captured {}; the sheet is a draft again and editable.",
        result.label
    )
}
