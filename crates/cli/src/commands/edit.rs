// `anggar edit <doc> <item>` — update row fields.

use anyhow::{bail, Context};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use anggar_common::protocol::methods;
use anggar_common::types::{Component, LineItem};

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Document id.
    pub doc: Uuid,

    /// Row id to edit.
    pub item: Uuid,

    /// New description text.
    #[arg(long)]
    description: Option<String>,

    /// Measurement unit, e.g. `m2` or `titik`.
    #[arg(long)]
    unit: Option<String>,

    /// Quantity: a number or a formula like `=4*2.5`.
    #[arg(long)]
    quantity: Option<String>,

    /// Clear the quantity back to not-entered.
    #[arg(long, conflicts_with = "quantity")]
    clear_quantity: bool,

    /// Unit price: a number or a formula. Marks the price as manual.
    #[arg(long)]
    price: Option<String>,

    /// Free-form note.
    #[arg(long)]
    note: Option<String>,

    /// Nesting depth (0 = category level).
    #[arg(long)]
    indent: Option<u32>,

    /// Overhead percentage on labor components.
    #[arg(long)]
    overhead_labor: Option<f64>,

    /// General overhead percentage.
    #[arg(long)]
    overhead_admin: Option<f64>,

    /// Profit margin percentage.
    #[arg(long)]
    margin: Option<f64>,

    /// Replace the AHS breakdown with a JSON array of components.
    #[arg(long, group = "breakdown_source")]
    breakdown: Option<String>,

    /// Read the breakdown JSON from a file.
    #[arg(long, group = "breakdown_source", value_name = "FILE")]
    breakdown_file: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResult {
    pub item: LineItem,
}

#[derive(Debug, Clone)]
struct EditRequest {
    doc: Uuid,
    item: Uuid,
    description: Option<String>,
    unit: Option<String>,
    quantity: Option<Value>,
    unit_price: Option<Value>,
    note: Option<String>,
    indent: Option<u32>,
    surcharges: Option<Value>,
    breakdown: Option<Value>,
}

pub fn run(args: EditArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let request = build_request(&args)?;

    let rt = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(call_edit(request.clone())))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_edit(request))
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

fn build_request(args: &EditArgs) -> anyhow::Result<EditRequest> {
    let quantity = if args.clear_quantity {
        Some(Value::Null)
    } else {
        args.quantity.as_deref().map(numeric_arg)
    };

    let surcharges = match (args.overhead_labor, args.overhead_admin, args.margin) {
        (None, None, None) => None,
        (Some(labor), Some(admin), Some(margin)) => Some(json!({
            "overhead_labor": labor,
            "overhead_admin": admin,
            "margin": margin,
        })),
        _ => bail!(
            "surcharge flags must be given together: --overhead-labor, --overhead-admin, --margin"
        ),
    };

    // Resolve breakdown JSON from --breakdown or --breakdown-file.
    let breakdown = match (&args.breakdown, &args.breakdown_file) {
        (Some(raw), _) => Some(parse_breakdown(raw)?),
        (_, Some(path)) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read breakdown file `{path}`"))?;
            Some(parse_breakdown(&raw)?)
        }
        (None, None) => None,
    };

    let request = EditRequest {
        doc: args.doc,
        item: args.item,
        description: args.description.clone(),
        unit: args.unit.clone(),
        quantity,
        unit_price: args.price.as_deref().map(numeric_arg),
        note: args.note.clone(),
        indent: args.indent,
        surcharges,
        breakdown,
    };

    let has_edit = request.description.is_some()
        || request.unit.is_some()
        || request.quantity.is_some()
        || request.unit_price.is_some()
        || request.note.is_some()
        || request.indent.is_some()
        || request.surcharges.is_some()
        || request.breakdown.is_some();
    if !has_edit {
        bail!("nothing to edit; pass at least one field flag (see `anggar edit --help`)");
    }
    Ok(request)
}

/// Plain numbers go over the wire as numbers; anything else is sent as
/// a string for the daemon's formula evaluator.
fn numeric_arg(raw: &str) -> Value {
    match raw.trim().parse::<f64>() {
        Ok(number) => json!(number),
        Err(_) => json!(raw),
    }
}

fn parse_breakdown(raw: &str) -> anyhow::Result<Value> {
    let mut value: Value =
        serde_json::from_str(raw).context("breakdown must be valid JSON")?;
    let Some(entries) = value.as_array_mut() else {
        bail!("breakdown must be a JSON array of components");
    };
    for entry in entries.iter_mut() {
        let Some(object) = entry.as_object_mut() else {
            bail!("each breakdown component must be a JSON object");
        };
        object.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
        object.entry("source").or_insert(json!("manual"));
    }
    // Reject malformed components before the RPC round-trip.
    serde_json::from_value::<Vec<Component>>(value.clone())
        .context("breakdown components are malformed")?;
    Ok(value)
}

async fn call_edit(request: EditRequest) -> anyhow::Result<EditResult> {
    let client = daemon_launcher::connected_client().await?;

    let mut params = json!({
        "id": request.doc,
        "item_id": request.item,
    });
    if let Some(description) = &request.description {
        params["description"] = json!(description);
    }
    if let Some(unit) = &request.unit {
        params["unit"] = json!(unit);
    }
    if let Some(quantity) = &request.quantity {
        params["quantity"] = quantity.clone();
    }
    if let Some(unit_price) = &request.unit_price {
        params["unit_price"] = unit_price.clone();
    }
    if let Some(note) = &request.note {
        params["note"] = json!(note);
    }
    if let Some(indent) = request.indent {
        params["indent"] = json!(indent);
    }
    if let Some(surcharges) = &request.surcharges {
        params["surcharges"] = surcharges.clone();
    }
    if let Some(breakdown) = &request.breakdown {
        params["breakdown"] = breakdown.clone();
    }

    client
        .call(methods::ITEM_UPDATE, params)
        .await
        .context("item.update request failed")
}

fn format_human(result: &EditResult) -> String {
    let item = &result.item;
    match item.quantity {
        Some(quantity) if item.is_work_item() => format!(
            "Updated {}: {} {} x {} = {}",
            item.description,
            output::fmt_quantity(quantity),
            item.unit,
            output::fmt_amount(item.unit_price),
            output::fmt_amount(item.amount()),
        ),
        _ => format!("Updated {}", item.description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> EditResult {
        let mut item = LineItem::new_work_item("Pembersihan lokasi");
        item.unit = "m2".into();
        item.quantity = Some(100.0);
        item.unit_price = 15_000.0;
        EditResult { item }
    }

    #[test]
    fn human_format_shows_the_priced_row() {
        let output = format_human(&sample_result());
        assert!(output.contains("Updated Pembersihan lokasi"));
        assert!(output.contains("100 m2"));
        assert!(output.contains("15.000"));
        assert!(output.contains("1.500.000"));
    }

    #[test]
    fn human_format_without_quantity_is_terse() {
        let mut result = sample_result();
        result.item.quantity = None;
        let output = format_human(&result);
        assert_eq!(output, "Updated Pembersihan lokasi");
    }

    #[test]
    fn json_format_roundtrips() {
        let result = sample_result();
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, format_human).unwrap();
        let parsed: EditResult = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.item.description, "Pembersihan lokasi");
        assert_eq!(parsed.item.quantity, Some(100.0));
    }

    #[test]
    fn numeric_args_pass_numbers_and_formulas() {
        assert_eq!(numeric_arg("12500"), json!(12500.0));
        assert_eq!(numeric_arg(" 2.5 "), json!(2.5));
        assert_eq!(numeric_arg("=4*2.5"), json!("=4*2.5"));
    }

    #[test]
    fn parse_breakdown_fills_missing_ids_and_source() {
        let raw = r#"[
            {"name": "Semen portland", "category": "material",
             "quantity": 0.5, "unit": "zak", "unit_price": 60000}
        ]"#;
        let value = parse_breakdown(raw).expect("breakdown should parse");
        let components: Vec<Component> =
            serde_json::from_value(value).expect("components should decode");
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "Semen portland");
        assert!(!components[0].id.is_nil());
    }

    #[test]
    fn parse_breakdown_rejects_non_arrays() {
        assert!(parse_breakdown(r#"{"name": "Semen"}"#).is_err());
        assert!(parse_breakdown("not json").is_err());
    }
}
