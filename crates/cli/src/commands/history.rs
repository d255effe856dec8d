// `anggar history <doc>` — list revisions and switch the viewed one.

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
pub struct HistoryArgs {
    /// Document id.
    pub doc: Uuid,

    /// View this revision read-only before listing.
    #[arg(long, value_name = "N")]
    view: Option<u32>,

    /// Return to the live sheet before listing.
    #[arg(long, conflicts_with = "view")]
    current: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResult {
    #[serde(default)]
    pub revisions: Vec<RevisionRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewing: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRow {
    pub number: u32,
    pub label: String,
    pub captured_at: DateTime<Utc>,
    pub item_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct ViewSwitch {
    #[serde(default)]
    viewing: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct RevisionList {
    #[serde(default)]
    revisions: Vec<RevisionRow>,
}

pub fn run(args: HistoryArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(call_history(args.doc, args.view, args.current)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_history(args.doc, args.view, args.current))
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

async fn call_history(
    doc: Uuid,
    view: Option<u32>,
    current: bool,
) -> anyhow::Result<HistoryResult> {
    let client = daemon_launcher::connected_client().await?;

    let viewing = if view.is_some() || current {
        let mut params = json!({ "id": doc });
        if let Some(number) = view {
            params["revision"] = json!(number);
        }
        let switched: ViewSwitch = client
            .call(methods::DOC_REVISION_VIEW, params)
            .await
            .context("doc.revision.view request failed")?;
        switched.viewing
    } else {
        None
    };

    let list: RevisionList = client
        .call(methods::DOC_REVISION_LIST, json!({ "id": doc }))
        .await
        .context("doc.revision.list request failed")?;

    Ok(HistoryResult {
        revisions: list.revisions,
        viewing,
    })
}

fn format_human(result: &HistoryResult) -> String {
    if result.revisions.is_empty() {
        return "No revisions yet. Lock the document and run `anggar revise` to capture one."
            .into();
    }

    let mut lines = Vec::new();
    lines.push(format!("{} revision(s)", result.revisions.len()));
    for revision in &result.revisions {
        let marker = if result.viewing == Some(revision.number) {
            "  (viewing)"
        } else {
            ""
        };
        lines.push(format!(
            "  {}  {}  {} row(s){marker}",
            revision.label,
            revision.captured_at.format("%Y-%m-%d %H:%M"),
            revision.item_count
        ));
    }
    if result.viewing.is_some() {
        lines.push(
            "The sheet is read-only while viewing; `anggar history <doc> --current` returns to it."
                .to_string(),
        );
    }
    lines.join("\n")
}
