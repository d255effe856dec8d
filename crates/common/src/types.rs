// Core domain types shared across all anggar crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row kind: grouping header or priced line of work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Category,
    WorkItem,
}

/// Where a work item's unit price came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Typed in directly; never produced by a resolver pass.
    Manual,
    /// Exact match against the work catalog.
    Database,
    /// Computed from a component breakdown (analisa harga satuan).
    Ahs,
    /// Combined strategy fell back to the item's own breakdown.
    Combined,
}

/// Cost class of a breakdown component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    Material,
    Labor,
    Equipment,
    Other(String),
}

impl ComponentCategory {
    /// Parse a category label, keeping unknown ones as `Other`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "material" => ComponentCategory::Material,
            "labor" => ComponentCategory::Labor,
            "equipment" => ComponentCategory::Equipment,
            other => ComponentCategory::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ComponentCategory::Material => "material",
            ComponentCategory::Labor => "labor",
            ComponentCategory::Equipment => "equipment",
            ComponentCategory::Other(label) => label,
        }
    }
}

/// Provenance of a breakdown component.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSource {
    Database,
    Ai,
    Manual,
}

/// One line of an AHS breakdown: a material, labor, or equipment input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub id: Uuid,
    pub name: String,
    pub category: ComponentCategory,
    /// Coefficient: quantity of this input per unit of work.
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub source: ComponentSource,
}

impl Component {
    pub fn amount(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// Percentage surcharges applied on top of an AHS base price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Surcharges {
    pub overhead_labor: f64,
    pub overhead_admin: f64,
    pub margin: f64,
}

impl Surcharges {
    /// Factor applied to the breakdown base: `1 + (sum of percentages)/100`.
    pub fn multiplier(&self) -> f64 {
        1.0 + (self.overhead_labor + self.overhead_admin + self.margin) / 100.0
    }
}

/// A single row of the cost sheet. Hierarchy is implied by sequence
/// order plus `indent`; there are no parent pointers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub id: Uuid,
    pub kind: ItemKind,
    /// Nesting depth; parent is the nearest preceding row at `indent - 1`.
    pub indent: u32,
    pub description: String,
    pub unit: String,
    /// `None` means not yet entered; contributes zero to totals.
    pub quantity: Option<f64>,
    pub unit_price: f64,
    pub note: String,
    pub price_source: Option<PriceSource>,
    #[serde(default)]
    pub breakdown: Vec<Component>,
    #[serde(default)]
    pub surcharges: Surcharges,
    /// Soft-deleted rows stay in the sequence until commit strips them.
    #[serde(default)]
    pub deleted: bool,
}

impl LineItem {
    pub fn new_category(description: impl Into<String>) -> Self {
        LineItem {
            id: Uuid::new_v4(),
            kind: ItemKind::Category,
            indent: 0,
            description: description.into(),
            unit: String::new(),
            quantity: None,
            unit_price: 0.0,
            note: String::new(),
            price_source: None,
            breakdown: Vec::new(),
            surcharges: Surcharges::default(),
            deleted: false,
        }
    }

    pub fn new_work_item(description: impl Into<String>) -> Self {
        LineItem {
            kind: ItemKind::WorkItem,
            ..LineItem::new_category(description)
        }
    }

    /// Extended amount for this row: quantity times unit price.
    /// Categories and deleted rows carry no amount of their own.
    pub fn amount(&self) -> f64 {
        if self.kind != ItemKind::WorkItem || self.deleted {
            return 0.0;
        }
        self.quantity.unwrap_or(0.0) * self.unit_price
    }

    pub fn is_category(&self) -> bool {
        self.kind == ItemKind::Category
    }

    pub fn is_work_item(&self) -> bool {
        self.kind == ItemKind::WorkItem
    }
}

/// A priced material/labor/equipment entry in the price catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceCatalogEntry {
    pub id: Uuid,
    pub name: String,
    pub category: ComponentCategory,
    pub unit: String,
    pub unit_price: f64,
    /// Free-form provenance, e.g. a regional price book reference.
    #[serde(default)]
    pub source_note: String,
    pub last_updated: DateTime<Utc>,
}

/// A reusable work definition: default price plus a standard breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkCatalogEntry {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub default_price: f64,
    #[serde(default)]
    pub default_breakdown: Vec<Component>,
    pub source: ComponentSource,
    pub last_updated: DateTime<Utc>,
}

/// Document flavor. Both kinds share the same engine; a BQ hides price
/// columns on export while still pricing items internally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Rab,
    Bq,
}

impl DocumentKind {
    pub fn shows_prices(&self) -> bool {
        matches!(self, DocumentKind::Rab)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Final,
}

/// A frozen snapshot of the sheet taken when a locked document is
/// reopened for revision. Immutable once pushed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revision {
    /// 1-based; rendered as "Revisi {number}".
    pub number: u32,
    pub captured_at: DateTime<Utc>,
    pub items: Vec<LineItem>,
}

impl Revision {
    pub fn label(&self) -> String {
        format!("Revisi {}", self.number)
    }
}

/// Lightweight listing row for stored documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    pub status: DocumentStatus,
    pub locked: bool,
    pub revision_count: u32,
    pub updated_at: DateTime<Utc>,
}
