// `anggar export <doc>` — printable rows, to the terminal or a CSV file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::export::{ExportRow, ExportRowKind};
use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Document id.
    pub doc: Uuid,

    /// Write the rows to this CSV file instead of the terminal.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    #[serde(default)]
    pub rows: Vec<ExportRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RowsEnvelope {
    #[serde(default)]
    rows: Vec<ExportRow>,
}

pub fn run(args: ExportArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_export(args.doc)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_export(args.doc))
        });

    match rt {
        Ok(rows) => {
            let written = match &args.out {
                Some(path) => {
                    write_csv(path, &rows)?;
                    Some(path.display().to_string())
                }
                None => None,
            };
            let result = ExportResult { rows, written };
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn call_export(doc: Uuid) -> anyhow::Result<Vec<ExportRow>> {
    let client = daemon_launcher::connected_client().await?;
    let envelope: RowsEnvelope = client
        .call(methods::EXPORT_ROWS, json!({ "id": doc }))
        .await
        .context("export.rows request failed")?;
    Ok(envelope.rows)
}

fn has_price_columns(rows: &[ExportRow]) -> bool {
    rows.iter()
        .any(|row| row.unit_price.is_some() || row.amount.is_some())
}

fn write_csv(path: &Path, rows: &[ExportRow]) -> anyhow::Result<()> {
    let with_prices = has_price_columns(rows);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create `{}`", path.display()))?;

    if with_prices {
        writer.write_record([
            "number",
            "description",
            "unit",
            "quantity",
            "unit_price",
            "amount",
            "note",
        ])?;
    } else {
        writer.write_record(["number", "description", "unit", "quantity", "note"])?;
    }

    for row in rows {
        let quantity = csv_number(row.quantity);
        if with_prices {
            let unit_price = csv_number(row.unit_price);
            let amount = csv_number(row.amount);
            writer.write_record([
                row.number.as_str(),
                row.description.as_str(),
                row.unit.as_str(),
                quantity.as_str(),
                unit_price.as_str(),
                amount.as_str(),
                row.note.as_str(),
            ])?;
        } else {
            writer.write_record([
                row.number.as_str(),
                row.description.as_str(),
                row.unit.as_str(),
                quantity.as_str(),
                row.note.as_str(),
            ])?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("failed to write `{}`", path.display()))
}

/// Machine-readable cell value; display formatting is the terminal's.
fn csv_number(value: Option<f64>) -> String {
    value.map(|number| format!("{number}")).unwrap_or_default()
}

fn format_human(result: &ExportResult) -> String {
    if let Some(file) = &result.written {
        return format!("Wrote {} row(s) to {file}.", result.rows.len());
    }
    if result.rows.is_empty() {
        return "Nothing to export; the sheet is empty.".into();
    }

    let with_prices = has_price_columns(&result.rows);
    let mut lines = Vec::new();
    for row in &result.rows {
        match row.kind {
            ExportRowKind::Category => {
                lines.push(format!("{:<8}{}", row.number, row.description));
            }
            ExportRowKind::WorkItem => {
                let quantity = row
                    .quantity
                    .map(output::fmt_quantity)
                    .unwrap_or_else(|| "-".into());
                let mut line = format!(
                    "{:<8}{:<40} {quantity:>10} {:<4}",
                    row.number, row.description, row.unit
                );
                if with_prices {
                    let unit_price = row
                        .unit_price
                        .map(output::fmt_amount)
                        .unwrap_or_default();
                    let amount = row.amount.map(output::fmt_amount).unwrap_or_default();
                    line.push_str(&format!(" {unit_price:>14} {amount:>16}"));
                }
                if !row.note.is_empty() {
                    line.push_str(&format!("  [{}]", row.note));
                }
                lines.push(line);
            }
            ExportRowKind::Subtotal | ExportRowKind::GrandTotal => {
                let amount = row.amount.map(output::fmt_amount).unwrap_or_default();
                lines.push(format!("{:<8}{:<40} {amount:>47}", "", row.description));
            }
        }
    }
    lines.join("\n")
}
