// `anggar catalog [query]` — search the price/work catalogs, or add an entry.

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;
use anggar_common::types::{ComponentCategory, PriceCatalogEntry, WorkCatalogEntry};

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Name fragment to match; omit to list every entry.
    pub query: Option<String>,

    /// Use the work catalog instead of the price catalog.
    #[arg(long)]
    work: bool,

    /// Add a new entry with this name instead of searching. Names must
    /// be unique per catalog, ignoring case.
    #[arg(long, value_name = "NAME", conflicts_with = "query")]
    add: Option<String>,

    /// Category for --add: material, labor, equipment, or free text.
    #[arg(long, requires = "add")]
    category: Option<String>,

    /// Measurement unit for --add, e.g. m3 or OH.
    #[arg(long, requires = "add")]
    unit: Option<String>,

    /// Unit price in rupiah for --add.
    #[arg(long, requires = "add")]
    price: Option<f64>,

    /// Provenance note for --add, e.g. a regional price book reference.
    #[arg(long, requires = "add", conflicts_with = "work")]
    note: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogResult {
    Saved(UpsertResult),
    Price(PriceSearchResult),
    Work(WorkSearchResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertResult {
    pub ok: bool,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSearchResult {
    #[serde(default)]
    pub entries: Vec<PriceCatalogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSearchResult {
    #[serde(default)]
    pub entries: Vec<WorkCatalogEntry>,
}

#[derive(Debug, Clone)]
struct CatalogRequest {
    query: Option<String>,
    work: bool,
    add: Option<String>,
    category: Option<String>,
    unit: Option<String>,
    price: Option<f64>,
    note: Option<String>,
}

pub fn run(args: CatalogArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let request = CatalogRequest {
        query: args.query,
        work: args.work,
        add: args.add,
        category: args.category,
        unit: args.unit,
        price: args.price,
        note: args.note,
    };

    let rt = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(call_catalog(request.clone())))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_catalog(request))
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

async fn call_catalog(request: CatalogRequest) -> anyhow::Result<CatalogResult> {
    let client = daemon_launcher::connected_client().await?;
    let kind = if request.work { "work" } else { "price" };

    if let Some(name) = &request.add {
        let category = request.category.as_deref().context("--add needs --category")?;
        let unit = request.unit.as_deref().context("--add needs --unit")?;
        let price = request.price.context("--add needs --price")?;
        // The daemon fills in id and last_updated for fresh entries.
        let entry = if request.work {
            json!({
                "name": name,
                "category": category,
                "unit": unit,
                "default_price": price,
                "source": "manual",
            })
        } else {
            json!({
                "name": name,
                "category": ComponentCategory::from_label(category),
                "unit": unit,
                "unit_price": price,
                "source_note": request.note.clone().unwrap_or_default(),
            })
        };
        let saved: UpsertResult = client
            .call(methods::CATALOG_UPSERT, json!({ "catalog": kind, "entry": entry }))
            .await
            .context("catalog.upsert request failed")?;
        return Ok(CatalogResult::Saved(saved));
    }

    let query = request.query.clone().unwrap_or_default();
    let params = json!({ "catalog": kind, "query": query });
    if request.work {
        let found: WorkSearchResult = client
            .call(methods::CATALOG_SEARCH, params)
            .await
            .context("catalog.search request failed")?;
        Ok(CatalogResult::Work(found))
    } else {
        let found: PriceSearchResult = client
            .call(methods::CATALOG_SEARCH, params)
            .await
            .context("catalog.search request failed")?;
        Ok(CatalogResult::Price(found))
    }
}

fn format_human(result: &CatalogResult) -> String {
    match result {
        CatalogResult::Saved(saved) => format!("Saved catalog entry {}.", saved.id),
        CatalogResult::Price(found) => {
            if found.entries.is_empty() {
                return "No matching catalog entries.".to_string();
            }
            let mut lines = Vec::new();
            for entry in &found.entries {
                let note = if entry.source_note.is_empty() {
                    String::new()
                } else {
                    format!(", {}", entry.source_note)
                };
                lines.push(format!(
                    "  {} — {} per {} ({}{})",
                    entry.name,
                    output::fmt_amount(entry.unit_price),
                    entry.unit,
                    entry.category.label(),
                    note,
                ));
            }
            lines.join("\n")
        }
        CatalogResult::Work(found) => {
            if found.entries.is_empty() {
                return "No matching catalog entries.".to_string();
            }
            let mut lines = Vec::new();
            for entry in &found.entries {
                let breakdown = if entry.default_breakdown.is_empty() {
                    String::new()
                } else {
                    format!(", {} component breakdown", entry.default_breakdown.len())
                };
                lines.push(format!(
                    "  {} — {} per {} ({}{})",
                    entry.name,
                    output::fmt_amount(entry.default_price),
                    entry.unit,
                    entry.category,
                    breakdown,
                ));
            }
            lines.join("\n")
        }
    }
}
