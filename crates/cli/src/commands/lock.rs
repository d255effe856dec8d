// `anggar lock <doc>` — mark a saved document final.

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;
use anggar_common::types::DocumentStatus;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct LockArgs {
    /// Document id.
    pub doc: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResult {
    pub locked: bool,
    pub status: DocumentStatus,
}

pub fn run(args: LockArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_lock(args.doc)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_lock(args.doc))
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

async fn call_lock(doc: Uuid) -> anyhow::Result<LockResult> {
    let client = daemon_launcher::connected_client().await?;
    client
        .call(methods::DOC_LOCK, json!({ "id": doc }))
        .await
        .context("doc.lock request failed")
}

fn format_human(result: &LockResult) -> String {
    if result.locked {
        "Document locked as final. Start a revision with `anggar revise` to edit it again.".into()
    } else {
        "Document is not locked.".into()
    }
}
