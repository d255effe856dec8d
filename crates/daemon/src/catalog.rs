// Price and work catalogs backed by the meta db.
//
// Names are the lookup key and are unique per catalog ignoring case.
// Resolver passes use exact-name lookups; the search methods feed
// autocomplete-style suggestions.

use std::fmt;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use anggar_common::types::{
    Component, ComponentCategory, ComponentSource, PriceCatalogEntry, WorkCatalogEntry,
};

/// Catalog failures the RPC layer maps to invalid-params responses.
#[derive(Debug)]
pub enum CatalogError {
    /// Another entry already owns this name (ignoring case).
    DuplicateName(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::DuplicateName(name) => {
                write!(f, "catalog already has an entry named `{name}`")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Component price reference rows (`price_catalog`).
pub struct PriceCatalogStore;

impl PriceCatalogStore {
    /// Insert or update an entry. Renaming onto another entry's name fails.
    pub fn upsert(conn: &Connection, entry: &PriceCatalogEntry) -> Result<()> {
        reject_duplicate_name(conn, "price_catalog", &entry.name, entry.id)?;
        conn.execute(
            "INSERT INTO price_catalog \
             (entry_id, name, category, unit, unit_price, source_note, last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT (entry_id) DO UPDATE SET \
                 name = excluded.name, \
                 category = excluded.category, \
                 unit = excluded.unit, \
                 unit_price = excluded.unit_price, \
                 source_note = excluded.source_note, \
                 last_updated = excluded.last_updated",
            params![
                entry.id.to_string(),
                entry.name,
                entry.category.label(),
                entry.unit,
                entry.unit_price,
                entry.source_note,
                entry.last_updated.to_rfc3339(),
            ],
        )
        .context("failed to upsert price catalog entry")?;
        Ok(())
    }

    /// Exact-name lookup, ignoring case.
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<PriceCatalogEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT entry_id, name, category, unit, unit_price, source_note, last_updated \
                 FROM price_catalog \
                 WHERE name = ?1 COLLATE NOCASE",
            )
            .context("failed to prepare price catalog lookup")?;
        let mut rows = stmt
            .query_map(params![name], row_to_raw_price)
            .context("failed to query price catalog by name")?;
        match rows.next() {
            Some(row) => {
                let raw = row.context("failed to decode price catalog row")?;
                price_entry_from_raw(raw).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Substring search for suggestions, ordered by name.
    pub fn search(conn: &Connection, needle: &str) -> Result<Vec<PriceCatalogEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT entry_id, name, category, unit, unit_price, source_note, last_updated \
                 FROM price_catalog \
                 WHERE name LIKE '%' || ?1 || '%' \
                 ORDER BY name COLLATE NOCASE ASC",
            )
            .context("failed to prepare price catalog search")?;
        let rows = stmt
            .query_map(params![needle], row_to_raw_price)
            .context("failed to search price catalog")?;
        let mut entries = Vec::new();
        for row in rows {
            let raw = row.context("failed to decode price catalog row")?;
            entries.push(price_entry_from_raw(raw)?);
        }
        Ok(entries)
    }

    pub fn list(conn: &Connection) -> Result<Vec<PriceCatalogEntry>> {
        Self::search(conn, "")
    }
}

/// Work item reference rows (`work_catalog`), including default breakdowns.
pub struct WorkCatalogStore;

impl WorkCatalogStore {
    /// Insert or update an entry. Renaming onto another entry's name fails.
    pub fn upsert(conn: &Connection, entry: &WorkCatalogEntry) -> Result<()> {
        reject_duplicate_name(conn, "work_catalog", &entry.name, entry.id)?;
        let breakdown_json = serde_json::to_string(&entry.default_breakdown)
            .context("failed to encode default breakdown")?;
        conn.execute(
            "INSERT INTO work_catalog \
             (entry_id, name, category, unit, default_price, breakdown_json, source, \
              last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT (entry_id) DO UPDATE SET \
                 name = excluded.name, \
                 category = excluded.category, \
                 unit = excluded.unit, \
                 default_price = excluded.default_price, \
                 breakdown_json = excluded.breakdown_json, \
                 source = excluded.source, \
                 last_updated = excluded.last_updated",
            params![
                entry.id.to_string(),
                entry.name,
                entry.category,
                entry.unit,
                entry.default_price,
                breakdown_json,
                source_to_str(entry.source),
                entry.last_updated.to_rfc3339(),
            ],
        )
        .context("failed to upsert work catalog entry")?;
        Ok(())
    }

    /// Exact-name lookup, ignoring case.
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<WorkCatalogEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT entry_id, name, category, unit, default_price, breakdown_json, \
                        source, last_updated \
                 FROM work_catalog \
                 WHERE name = ?1 COLLATE NOCASE",
            )
            .context("failed to prepare work catalog lookup")?;
        let mut rows = stmt
            .query_map(params![name], row_to_raw_work)
            .context("failed to query work catalog by name")?;
        match rows.next() {
            Some(row) => {
                let raw = row.context("failed to decode work catalog row")?;
                work_entry_from_raw(raw).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Substring search for suggestions, ordered by name.
    pub fn search(conn: &Connection, needle: &str) -> Result<Vec<WorkCatalogEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT entry_id, name, category, unit, default_price, breakdown_json, \
                        source, last_updated \
                 FROM work_catalog \
                 WHERE name LIKE '%' || ?1 || '%' \
                 ORDER BY name COLLATE NOCASE ASC",
            )
            .context("failed to prepare work catalog search")?;
        let rows = stmt
            .query_map(params![needle], row_to_raw_work)
            .context("failed to search work catalog")?;
        let mut entries = Vec::new();
        for row in rows {
            let raw = row.context("failed to decode work catalog row")?;
            entries.push(work_entry_from_raw(raw)?);
        }
        Ok(entries)
    }

    pub fn list(conn: &Connection) -> Result<Vec<WorkCatalogEntry>> {
        Self::search(conn, "")
    }
}

fn reject_duplicate_name(
    conn: &Connection,
    table: &str,
    name: &str,
    id: Uuid,
) -> Result<()> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT entry_id FROM {table} WHERE name = ?1 COLLATE NOCASE"
        ))
        .context("failed to prepare duplicate name check")?;
    let mut rows = stmt
        .query_map(params![name], |row| row.get::<_, String>(0))
        .context("failed to check for duplicate catalog name")?;
    if let Some(row) = rows.next() {
        let existing = row.context("failed to decode duplicate name row")?;
        if existing != id.to_string() {
            return Err(CatalogError::DuplicateName(name.to_string()).into());
        }
    }
    Ok(())
}

struct RawPriceRow {
    entry_id: String,
    name: String,
    category: String,
    unit: String,
    unit_price: f64,
    source_note: String,
    last_updated: String,
}

fn row_to_raw_price(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPriceRow> {
    Ok(RawPriceRow {
        entry_id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        unit: row.get(3)?,
        unit_price: row.get(4)?,
        source_note: row.get(5)?,
        last_updated: row.get(6)?,
    })
}

fn price_entry_from_raw(raw: RawPriceRow) -> Result<PriceCatalogEntry> {
    Ok(PriceCatalogEntry {
        id: parse_entry_id(&raw.entry_id)?,
        name: raw.name,
        category: ComponentCategory::from_label(&raw.category),
        unit: raw.unit,
        unit_price: raw.unit_price,
        source_note: raw.source_note,
        last_updated: parse_timestamp(&raw.last_updated)?,
    })
}

struct RawWorkRow {
    entry_id: String,
    name: String,
    category: String,
    unit: String,
    default_price: f64,
    breakdown_json: String,
    source: String,
    last_updated: String,
}

fn row_to_raw_work(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawWorkRow> {
    Ok(RawWorkRow {
        entry_id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        unit: row.get(3)?,
        default_price: row.get(4)?,
        breakdown_json: row.get(5)?,
        source: row.get(6)?,
        last_updated: row.get(7)?,
    })
}

fn work_entry_from_raw(raw: RawWorkRow) -> Result<WorkCatalogEntry> {
    let default_breakdown: Vec<Component> = serde_json::from_str(&raw.breakdown_json)
        .context("failed to decode default breakdown")?;
    Ok(WorkCatalogEntry {
        id: parse_entry_id(&raw.entry_id)?,
        name: raw.name,
        category: raw.category,
        unit: raw.unit,
        default_price: raw.default_price,
        default_breakdown,
        source: source_from_str(&raw.source)?,
        last_updated: parse_timestamp(&raw.last_updated)?,
    })
}

fn parse_entry_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid catalog entry id `{raw}`"))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp `{raw}`"))
}

fn source_to_str(source: ComponentSource) -> &'static str {
    match source {
        ComponentSource::Database => "database",
        ComponentSource::Ai => "ai",
        ComponentSource::Manual => "manual",
    }
}

fn source_from_str(raw: &str) -> Result<ComponentSource> {
    match raw {
        "database" => Ok(ComponentSource::Database),
        "ai" => Ok(ComponentSource::Ai),
        "manual" => Ok(ComponentSource::Manual),
        other => bail!("unknown component source `{other}`"),
    }
}
