// `anggar show <doc>` — render the numbered sheet with totals.

use std::collections::BTreeMap;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;
use anggar_common::types::{DocumentKind, DocumentStatus, ItemKind, LineItem};

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Document id (see `anggar ls`).
    pub doc: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowResult {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_code: Option<String>,
    pub status: DocumentStatus,
    pub locked: bool,
    /// Set when a historical revision is being viewed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Hierarchical number per visible item id.
    #[serde(default)]
    pub numbers: BTreeMap<String, String>,
    #[serde(default)]
    pub orphaned: Vec<Uuid>,
    #[serde(default)]
    pub subtotals: BTreeMap<String, f64>,
    #[serde(default)]
    pub grand_total: f64,
    #[serde(default)]
    pub session: SessionInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub editing: Vec<Uuid>,
    #[serde(default)]
    pub new: Vec<Uuid>,
    #[serde(default)]
    pub pricing_loading: Vec<Uuid>,
    #[serde(default)]
    pub dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewing_revision: Option<u32>,
}

pub fn run(args: ShowArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_show(args.doc)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_show(args.doc))
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

async fn call_show(doc: Uuid) -> anyhow::Result<ShowResult> {
    let client = daemon_launcher::connected_client().await?;
    client
        .call(methods::DOC_SHOW, json!({ "id": doc }))
        .await
        .context("doc.show request failed")
}

fn format_human(result: &ShowResult) -> String {
    let kind = match result.kind {
        DocumentKind::Rab => "RAB",
        DocumentKind::Bq => "BQ",
    };
    let status = match result.status {
        DocumentStatus::Draft => "draft",
        DocumentStatus::Final => "final",
    };
    let locked = if result.locked { ", locked" } else { "" };
    let dirty = if result.session.dirty { " *unsaved" } else { "" };
    let with_prices = result.kind.shows_prices();

    let mut lines = Vec::new();
    lines.push(format!("{} ({kind}, {status}{locked}){dirty}", result.title));
    if let Some(code) = &result.project_code {
        lines.push(format!("Project: {code}"));
    }
    if let Some(revision) = result.revision {
        lines.push(format!("Viewing Revisi {revision} (read-only)"));
    }
    lines.push(String::new());

    for item in &result.items {
        if item.deleted {
            continue;
        }
        let number = result
            .numbers
            .get(&item.id.to_string())
            .cloned()
            .unwrap_or_default();
        let indent = "  ".repeat(item.indent as usize);
        match item.kind {
            ItemKind::Category => {
                lines.push(format!("{indent}{number:<8}{}", item.description));
            }
            ItemKind::WorkItem => {
                let quantity = item
                    .quantity
                    .map(output::fmt_quantity)
                    .unwrap_or_else(|| "-".into());
                let mut line = format!(
                    "{indent}{number:<8}{:<40} {quantity:>10} {:<4}",
                    item.description, item.unit
                );
                if with_prices {
                    let amount = if item.quantity.is_some() {
                        output::fmt_amount(item.amount())
                    } else {
                        "-".into()
                    };
                    line.push_str(&format!(
                        " {:>14} {amount:>16}",
                        output::fmt_amount(item.unit_price)
                    ));
                }
                if !item.note.is_empty() {
                    line.push_str(&format!("  [{}]", item.note));
                }
                lines.push(line);
            }
        }
    }

    if with_prices {
        lines.push(String::new());
        for item in &result.items {
            if item.deleted || item.kind != ItemKind::Category {
                continue;
            }
            let id_key = item.id.to_string();
            if let (Some(number), Some(subtotal)) =
                (result.numbers.get(&id_key), result.subtotals.get(&id_key))
            {
                lines.push(format!(
                    "JUMLAH {number:<8} {:>16}",
                    output::fmt_amount(*subtotal)
                ));
            }
        }
        lines.push(format!(
            "JUMLAH TOTAL    {:>16}",
            output::fmt_amount(result.grand_total)
        ));
    }

    if !result.orphaned.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "{} orphaned row(s) excluded from numbering and totals",
            result.orphaned.len()
        ));
    }
    if !result.session.pricing_loading.is_empty() {
        lines.push(format!(
            "{} row(s) still waiting on price resolution",
            result.session.pricing_loading.len()
        ));
    }

    lines.join("\n")
}
