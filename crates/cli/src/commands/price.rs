// `anggar price <doc>` — run a pricing pass, or estimate one component.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;
use anggar_common::types::{Component, ComponentCategory, PriceSource};

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyArg {
    /// Work catalog prices only; the pass applies all or nothing.
    Database,
    /// Breakdown math, generating missing breakdowns per item.
    Ahs,
    /// Catalog price first, the item's own breakdown as fallback.
    Combined,
}

#[derive(Debug, Args)]
pub struct PriceArgs {
    /// Document id. Not needed with --component.
    #[arg(required_unless_present = "component")]
    pub doc: Option<Uuid>,

    /// Pricing strategy for the pass.
    #[arg(long, value_enum, default_value = "combined")]
    strategy: StrategyArg,

    /// Limit the pass to these row ids (repeatable).
    #[arg(long = "item", value_name = "ITEM")]
    items: Vec<Uuid>,

    /// Resolve a single row; generated breakdowns are returned for
    /// review instead of being written.
    #[arg(long, value_name = "ITEM", conflicts_with = "items")]
    single: Option<Uuid>,

    /// Estimate the price of one named component via the assistant.
    #[arg(long, value_name = "NAME", conflicts_with_all = ["single", "items"])]
    component: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceResult {
    Component(ComponentPriceResult),
    Single(SingleResult),
    Bulk(BulkResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentPriceResult {
    pub name: String,
    pub unit: String,
    pub unit_price: f64,
    pub category: ComponentCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SingleResult {
    Applied { unit_price: f64, source: PriceSource },
    Unresolved { description: String },
    NeedsReview { components: Vec<Component> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResult {
    #[serde(default)]
    pub resolved: Vec<Uuid>,
    #[serde(default)]
    pub unresolved: Vec<UnresolvedRow>,
    #[serde(default)]
    pub generated: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedRow {
    pub id: Uuid,
    pub description: String,
}

#[derive(Debug, Clone)]
struct PriceRequest {
    doc: Option<Uuid>,
    strategy: StrategyArg,
    items: Vec<Uuid>,
    single: Option<Uuid>,
    component: Option<String>,
}

pub fn run(args: PriceArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let request = PriceRequest {
        doc: args.doc,
        strategy: args.strategy,
        items: args.items,
        single: args.single,
        component: args.component,
    };

    let rt = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(call_price(request.clone())))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_price(request))
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

async fn call_price(request: PriceRequest) -> anyhow::Result<PriceResult> {
    let client = daemon_launcher::connected_client().await?;

    if let Some(name) = &request.component {
        let price: ComponentPriceResult = client
            .call(methods::PRICE_COMPONENT, json!({ "name": name }))
            .await
            .context("price.component request failed")?;
        return Ok(PriceResult::Component(price));
    }

    let doc = request.doc.context("a document id is required")?;
    if let Some(item) = request.single {
        let resolution: SingleResult = client
            .call(
                methods::PRICE_RESOLVE_SINGLE,
                json!({
                    "id": doc,
                    "item_id": item,
                    "strategy": request.strategy,
                }),
            )
            .await
            .context("price.resolve_single request failed")?;
        return Ok(PriceResult::Single(resolution));
    }

    let mut params = json!({
        "id": doc,
        "strategy": request.strategy,
    });
    if !request.items.is_empty() {
        params["item_ids"] = json!(request.items);
    }
    let report: BulkResult = client
        .call(methods::PRICE_RESOLVE, params)
        .await
        .context("price.resolve request failed")?;
    Ok(PriceResult::Bulk(report))
}

fn format_human(result: &PriceResult) -> String {
    match result {
        PriceResult::Component(price) => format!(
            "{}: {} per {} ({})",
            price.name,
            output::fmt_amount(price.unit_price),
            price.unit,
            price.category.label()
        ),
        PriceResult::Single(SingleResult::Applied { unit_price, source }) => format!(
            "Applied unit price {} (source: {}).",
            output::fmt_amount(*unit_price),
            source_label(*source)
        ),
        PriceResult::Single(SingleResult::Unresolved { description }) => {
            format!("No price found for {description}.")
        }
        PriceResult::Single(SingleResult::NeedsReview { components }) => {
            let mut lines = Vec::new();
            lines.push(format!(
                "Generated {} component(s) for review; nothing was written:",
                components.len()
            ));
            for component in components {
                lines.push(format!(
                    "  {} {} {} x {} = {}",
                    component.name,
                    output::fmt_quantity(component.quantity),
                    component.unit,
                    output::fmt_amount(component.unit_price),
                    output::fmt_amount(component.amount()),
                ));
            }
            lines.push("Apply them with `anggar edit --breakdown`.".to_string());
            lines.join("\n")
        }
        PriceResult::Bulk(report) => {
            let mut lines = Vec::new();
            lines.push(format!("Priced {} row(s).", report.resolved.len()));
            if !report.generated.is_empty() {
                lines.push(format!(
                    "{} breakdown(s) were generated by the assistant.",
                    report.generated.len()
                ));
            }
            if !report.unresolved.is_empty() {
                lines.push(format!("{} row(s) left unresolved:", report.unresolved.len()));
                for row in &report.unresolved {
                    lines.push(format!("  {} ({})", row.description, row.id));
                }
            }
            lines.join("\n")
        }
    }
}

fn source_label(source: PriceSource) -> &'static str {
    match source {
        PriceSource::Manual => "manual",
        PriceSource::Database => "database",
        PriceSource::Ahs => "ahs",
        PriceSource::Combined => "combined",
    }
}

#[cfg(test)]
mod tests {
    use anggar_common::types::ComponentSource;

    use super::*;

    #[test]
    fn bulk_report_lists_unresolved_rows() {
        let report = PriceResult::Bulk(BulkResult {
            resolved: vec![Uuid::from_u128(1), Uuid::from_u128(2)],
            unresolved: vec![UnresolvedRow {
                id: Uuid::from_u128(3),
                description: "Pekerjaan istimewa".into(),
            }],
            generated: vec![Uuid::from_u128(2)],
        });
        let output = format_human(&report);
        assert!(output.contains("Priced 2 row(s)."));
        assert!(output.contains("1 breakdown(s) were generated"));
        assert!(output.contains("Pekerjaan istimewa"));
    }

    #[test]
    fn applied_resolution_names_the_source() {
        let result = PriceResult::Single(SingleResult::Applied {
            unit_price: 185_000.0,
            source: PriceSource::Database,
        });
        let output = format_human(&result);
        assert!(output.contains("185.000"));
        assert!(output.contains("source: database"));
    }

    #[test]
    fn needs_review_lists_components_and_hints_at_edit() {
        let result = PriceResult::Single(SingleResult::NeedsReview {
            components: vec![Component {
                id: Uuid::from_u128(5),
                name: "Upah tukang".into(),
                category: ComponentCategory::Labor,
                quantity: 1.5,
                unit: "OH".into(),
                unit_price: 80_000.0,
                source: ComponentSource::Ai,
            }],
        });
        let output = format_human(&result);
        assert!(output.contains("for review"));
        assert!(output.contains("Upah tukang 1,5 OH"));
        assert!(output.contains("120.000"));
        assert!(output.contains("anggar edit --breakdown"));
    }

    #[test]
    fn component_price_prints_one_line() {
        let result = PriceResult::Component(ComponentPriceResult {
            name: "Semen portland".into(),
            unit: "zak".into(),
            unit_price: 60_000.0,
            category: ComponentCategory::Material,
        });
        assert_eq!(
            format_human(&result),
            "Semen portland: 60.000 per zak (material)"
        );
    }

    #[test]
    fn json_format_roundtrips_per_mode() {
        let bulk = PriceResult::Bulk(BulkResult {
            resolved: vec![Uuid::from_u128(1)],
            unresolved: vec![],
            generated: vec![],
        });
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &bulk, format_human).unwrap();
        let parsed: PriceResult = serde_json::from_slice(&buf).unwrap();
        match parsed {
            PriceResult::Bulk(report) => assert_eq!(report.resolved.len(), 1),
            other => panic!("expected a bulk report, got {other:?}"),
        }

        let single = PriceResult::Single(SingleResult::Unresolved {
            description: "Bongkaran".into(),
        });
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &single, format_human).unwrap();
        let parsed: PriceResult = serde_json::from_slice(&buf).unwrap();
        match parsed {
            PriceResult::Single(SingleResult::Unresolved { description }) => {
                assert_eq!(description, "Bongkaran");
            }
            other => panic!("expected an unresolved outcome, got {other:?}"),
        }
    }
}
