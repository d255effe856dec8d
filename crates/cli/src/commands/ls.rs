// `anggar ls` — list stored documents.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use anggar_common::protocol::methods;
use anggar_common::types::{DocumentKind, DocumentStatus, DocumentSummary};

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsResult {
    #[serde(default)]
    pub documents: Vec<DocumentSummary>,
}

pub fn run(args: LsArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let rt = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(call_ls()))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_ls())
        });

    match rt {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_error(format, "RPC_ERROR", &format!("{e:#}"));
            Err(e)
        }
    }
}

async fn call_ls() -> anyhow::Result<LsResult> {
    let client = daemon_launcher::connected_client().await?;
    client.call(methods::DOC_LIST, json!({})).await
}

fn format_human(result: &LsResult) -> String {
    if result.documents.is_empty() {
        return "No documents yet. Create one with `anggar new <title>`.".into();
    }

    let mut lines = Vec::new();
    lines.push(format!("{} document(s)", result.documents.len()));
    for doc in &result.documents {
        let kind = match doc.kind {
            DocumentKind::Rab => "RAB",
            DocumentKind::Bq => "BQ",
        };
        let status = match doc.status {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Final => "final",
        };
        let locked = if doc.locked { ", locked" } else { "" };
        let revisions = if doc.revision_count > 0 {
            format!(", {} revision(s)", doc.revision_count)
        } else {
            String::new()
        };
        lines.push(format!(
            "  {}  {} — {} ({status}{locked}{revisions})",
            doc.id, kind, doc.title
        ));
    }
    lines.join("\n")
}
