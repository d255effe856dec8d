// documents + document_revisions table access.
//
// The sheet is stored as one JSON payload per document; revisions are
// one row per snapshot. Save rewrites both inside a single transaction
// so a document on disk is always internally consistent.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use anggar_common::document::Document;
use anggar_common::types::{
    DocumentKind, DocumentStatus, DocumentSummary, LineItem, Revision,
};

/// CRUD operations for `documents` and `document_revisions`.
pub struct DocumentsStore;

impl DocumentsStore {
    /// Upsert the document row and rewrite its revision rows.
    pub fn save(conn: &mut Connection, doc: &Document) -> Result<()> {
        let items_json =
            serde_json::to_string(&doc.items).context("failed to encode document items")?;

        let tx = conn.transaction().context("failed to start document save transaction")?;
        tx.execute(
            "INSERT INTO documents \
             (doc_id, kind, title, project_code, status, locked, items_json, \
              created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT (doc_id) DO UPDATE SET \
                 kind = excluded.kind, \
                 title = excluded.title, \
                 project_code = excluded.project_code, \
                 status = excluded.status, \
                 locked = excluded.locked, \
                 items_json = excluded.items_json, \
                 updated_at = excluded.updated_at",
            params![
                doc.id.to_string(),
                kind_to_str(doc.kind),
                doc.title,
                doc.project_code,
                status_to_str(doc.status),
                doc.locked,
                items_json,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )
        .context("failed to upsert document row")?;

        tx.execute(
            "DELETE FROM document_revisions WHERE doc_id = ?1",
            params![doc.id.to_string()],
        )
        .context("failed to clear stale revision rows")?;

        for revision in &doc.revisions {
            let revision_json = serde_json::to_string(&revision.items)
                .context("failed to encode revision items")?;
            tx.execute(
                "INSERT INTO document_revisions (doc_id, number, captured_at, items_json) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    doc.id.to_string(),
                    revision.number,
                    revision.captured_at.to_rfc3339(),
                    revision_json,
                ],
            )
            .with_context(|| format!("failed to insert revision row {}", revision.number))?;
        }

        tx.commit().context("failed to commit document save")
    }

    /// Fetch a document by id, reassembling items and revisions.
    pub fn load(conn: &Connection, doc_id: Uuid) -> Result<Option<Document>> {
        let mut stmt = conn
            .prepare(
                "SELECT doc_id, kind, title, project_code, status, locked, items_json, \
                        created_at, updated_at \
                 FROM documents \
                 WHERE doc_id = ?1",
            )
            .context("failed to prepare document by id query")?;

        let mut rows = stmt
            .query_map(params![doc_id.to_string()], row_to_raw)
            .context("failed to query document by id")?;

        let raw = match rows.next() {
            Some(row) => row.context("failed to decode document row")?,
            None => return Ok(None),
        };

        let revisions = load_revisions(conn, doc_id)?;
        document_from_raw(raw, revisions).map(Some)
    }

    /// List stored documents, most recently updated first.
    pub fn list(conn: &Connection) -> Result<Vec<DocumentSummary>> {
        let mut stmt = conn
            .prepare(
                "SELECT d.doc_id, d.kind, d.title, d.status, d.locked, \
                        (SELECT COUNT(*) FROM document_revisions r \
                          WHERE r.doc_id = d.doc_id) AS revision_count, \
                        d.updated_at \
                 FROM documents d \
                 ORDER BY d.updated_at DESC, d.doc_id ASC",
            )
            .context("failed to prepare document list query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .context("failed to query document list")?;

        let mut summaries = Vec::new();
        for row in rows {
            let (doc_id, kind, title, status, locked, revision_count, updated_at) =
                row.context("failed to decode document list row")?;
            summaries.push(DocumentSummary {
                id: parse_doc_id(&doc_id)?,
                kind: kind_from_str(&kind)?,
                title,
                status: status_from_str(&status)?,
                locked,
                revision_count,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(summaries)
    }

    /// Delete a document; revision rows go with it via the cascade.
    pub fn delete(conn: &Connection, doc_id: Uuid) -> Result<bool> {
        let changed = conn
            .execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id.to_string()])
            .context("failed to delete document row")?;
        Ok(changed > 0)
    }
}

struct RawDocumentRow {
    doc_id: String,
    kind: String,
    title: String,
    project_code: Option<String>,
    status: String,
    locked: bool,
    items_json: String,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocumentRow> {
    Ok(RawDocumentRow {
        doc_id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        project_code: row.get(3)?,
        status: row.get(4)?,
        locked: row.get(5)?,
        items_json: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn document_from_raw(raw: RawDocumentRow, revisions: Vec<Revision>) -> Result<Document> {
    let items: Vec<LineItem> =
        serde_json::from_str(&raw.items_json).context("failed to decode document items")?;
    Ok(Document {
        id: parse_doc_id(&raw.doc_id)?,
        kind: kind_from_str(&raw.kind)?,
        title: raw.title,
        project_code: raw.project_code,
        status: status_from_str(&raw.status)?,
        locked: raw.locked,
        items,
        revisions,
        created_at: parse_timestamp(&raw.created_at)?,
        updated_at: parse_timestamp(&raw.updated_at)?,
    })
}

fn load_revisions(conn: &Connection, doc_id: Uuid) -> Result<Vec<Revision>> {
    let mut stmt = conn
        .prepare(
            "SELECT number, captured_at, items_json \
             FROM document_revisions \
             WHERE doc_id = ?1 \
             ORDER BY number ASC",
        )
        .context("failed to prepare revision query")?;

    let rows = stmt
        .query_map(params![doc_id.to_string()], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .context("failed to query revisions")?;

    let mut revisions = Vec::new();
    for row in rows {
        let (number, captured_at, items_json) = row.context("failed to decode revision row")?;
        let items: Vec<LineItem> = serde_json::from_str(&items_json)
            .with_context(|| format!("failed to decode items for revision {number}"))?;
        revisions.push(Revision {
            number,
            captured_at: parse_timestamp(&captured_at)?,
            items,
        });
    }
    Ok(revisions)
}

fn parse_doc_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid document id `{raw}`"))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp `{raw}`"))
}

fn kind_to_str(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Rab => "rab",
        DocumentKind::Bq => "bq",
    }
}

fn kind_from_str(raw: &str) -> Result<DocumentKind> {
    match raw {
        "rab" => Ok(DocumentKind::Rab),
        "bq" => Ok(DocumentKind::Bq),
        other => bail!("unknown document kind `{other}`"),
    }
}

fn status_to_str(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Draft => "draft",
        DocumentStatus::Final => "final",
    }
}

fn status_from_str(raw: &str) -> Result<DocumentStatus> {
    match raw {
        "draft" => Ok(DocumentStatus::Draft),
        "final" => Ok(DocumentStatus::Final),
        other => bail!("unknown document status `{other}`"),
    }
}
