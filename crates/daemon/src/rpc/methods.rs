use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::ai::{BreakdownGenerator, DisabledGenerator, GeneratorError};
use crate::catalog::{CatalogError, PriceCatalogStore, WorkCatalogStore};
use crate::config::DefaultsConfig;
use crate::pricing::{PriceResolver, PriceStrategy};
use crate::session::{OpenDocument, SessionFlags, ViewSelector};
use crate::store::documents::DocumentsStore;
use crate::store::meta_db::MetaDb;
use anggar_common::document::{Document, DocumentError};
use anggar_common::export::{export_rows, ExportRow};
use anggar_common::formula::{self, FormulaError};
use anggar_common::import::{import_rows, ImportError};
use anggar_common::numbering::Numbering;
use anggar_common::protocol::jsonrpc::{
    Request, RequestId, Response, RpcError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use anggar_common::sheet::{FieldEdit, MoveDirection, SheetError};
use anggar_common::totals::Totals;
use anggar_common::types::{
    Component, DocumentKind, DocumentStatus, DocumentSummary, LineItem, PriceCatalogEntry,
    Surcharges, WorkCatalogEntry,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

// ── Server state ────────────────────────────────────────────────────

/// Shared state behind the RPC server: the set of open documents with
/// their editor sessions, the meta database, and the price resolver.
#[derive(Clone)]
pub struct RpcServerState {
    docs: Arc<RwLock<HashMap<Uuid, OpenDocument>>>,
    db: Arc<Mutex<MetaDb>>,
    resolver: PriceResolver,
    generator: Arc<dyn BreakdownGenerator>,
    default_surcharges: Surcharges,
    shutdown_notifier: Option<broadcast::Sender<()>>,
}

impl RpcServerState {
    pub fn new(
        db: MetaDb,
        generator: Arc<dyn BreakdownGenerator>,
        defaults: DefaultsConfig,
    ) -> Self {
        let db = Arc::new(Mutex::new(db));
        let docs: Arc<RwLock<HashMap<Uuid, OpenDocument>>> = Arc::new(RwLock::new(HashMap::new()));
        let resolver =
            PriceResolver::new(Arc::clone(&docs), Arc::clone(&db), Arc::clone(&generator));
        Self {
            docs,
            db,
            resolver,
            generator,
            default_surcharges: defaults.surcharges,
            shutdown_notifier: None,
        }
    }

    /// Attach a channel the `daemon.shutdown` method signals on.
    pub fn with_shutdown_notifier(mut self, notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(notifier);
        self
    }

    fn with_db<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|_| anyhow!("meta db lock poisoned"))?;
        f(db.connection())
    }

    fn with_db_mut<T>(&self, f: impl FnOnce(&mut rusqlite::Connection) -> Result<T>) -> Result<T> {
        let mut db = self
            .db
            .lock()
            .map_err(|_| anyhow!("meta db lock poisoned"))?;
        f(db.connection_mut())
    }

    /// Loads the document from the store on first touch; later calls
    /// find it already open.
    async fn ensure_open(&self, doc_id: Uuid) -> Result<()> {
        {
            let docs = self.docs.read().await;
            if docs.contains_key(&doc_id) {
                return Ok(());
            }
        }
        let loaded = self.with_db(|conn| DocumentsStore::load(conn, doc_id))?;
        let Some(document) = loaded else {
            return Err(RequestError::UnknownDocument(doc_id).into());
        };
        let mut docs = self.docs.write().await;
        docs.entry(doc_id)
            .or_insert_with(|| OpenDocument::new(document));
        Ok(())
    }

    async fn with_open_doc<T>(
        &self,
        doc_id: Uuid,
        f: impl FnOnce(&mut OpenDocument) -> Result<T>,
    ) -> Result<T> {
        self.ensure_open(doc_id).await?;
        let mut docs = self.docs.write().await;
        let open = docs
            .get_mut(&doc_id)
            .ok_or_else(|| anyhow!("document {doc_id} is not open"))?;
        f(open)
    }

    /// Mutations need the live sheet: not locked, not viewing history.
    fn ensure_mutable(open: &OpenDocument) -> Result<()> {
        if open.session.viewing_revision().is_some() {
            return Err(DocumentError::ViewingRevision.into());
        }
        open.document.ensure_unlocked()?;
        Ok(())
    }

    async fn create_document(&self, params: DocCreateParams) -> Result<DocCreateResult> {
        let mut document = Document::new(params.kind, params.title, Utc::now());
        document.project_code = params.project_code;
        let id = document.id;
        self.with_db_mut(|conn| DocumentsStore::save(conn, &document))?;
        self.docs.write().await.insert(id, OpenDocument::new(document));
        Ok(DocCreateResult { id })
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.with_db(DocumentsStore::list)
    }

    async fn show_document(&self, doc_id: Uuid) -> Result<DocShowResult> {
        self.with_open_doc(doc_id, |open| {
            let (items, revision) = match open.session.view() {
                ViewSelector::Current => (open.document.items.clone(), None),
                ViewSelector::Revision(number) => {
                    let revision = open
                        .document
                        .revision(number)
                        .ok_or(DocumentError::UnknownRevision(number))?;
                    (revision.items.clone(), Some(number))
                }
            };
            let numbering = Numbering::compute(&items);
            let totals = Totals::compute(&items);
            let mut numbers = BTreeMap::new();
            let mut subtotals = BTreeMap::new();
            for item in items.iter().filter(|item| !item.deleted) {
                if let Some(number) = numbering.get(item.id) {
                    numbers.insert(item.id.to_string(), number.to_string());
                }
                if item.is_category() {
                    if let Some(subtotal) = totals.subtotal(item.id) {
                        subtotals.insert(item.id.to_string(), subtotal);
                    }
                }
            }
            Ok(DocShowResult {
                id: open.document.id,
                kind: open.document.kind,
                title: open.document.title.clone(),
                project_code: open.document.project_code.clone(),
                status: open.document.status,
                locked: open.document.locked,
                revision,
                items,
                numbers,
                orphaned: numbering.orphaned().to_vec(),
                subtotals,
                grand_total: totals.grand_total(),
                session: open.session.flags(),
            })
        })
        .await
    }

    async fn save_document(&self, doc_id: Uuid) -> Result<DocSaveResult> {
        self.with_open_doc(doc_id, |open| {
            Self::ensure_mutable(open)?;
            let removed = open.document.commit(Utc::now())?;
            self.with_db_mut(|conn| DocumentsStore::save(conn, &open.document))?;
            open.session.mark_saved();
            Ok(DocSaveResult {
                removed,
                updated_at: open.document.updated_at,
            })
        })
        .await
    }

    async fn lock_document(&self, doc_id: Uuid) -> Result<DocLockResult> {
        self.with_open_doc(doc_id, |open| {
            if open.session.viewing_revision().is_some() {
                return Err(DocumentError::ViewingRevision.into());
            }
            if open.session.is_dirty() {
                return Err(DocumentError::UnsavedChanges.into());
            }
            open.document.lock(Utc::now())?;
            self.with_db_mut(|conn| DocumentsStore::save(conn, &open.document))?;
            Ok(DocLockResult {
                locked: true,
                status: open.document.status,
            })
        })
        .await
    }

    async fn start_revision(&self, doc_id: Uuid) -> Result<RevisionStartResult> {
        self.with_open_doc(doc_id, |open| {
            if open.session.viewing_revision().is_some() {
                return Err(DocumentError::ViewingRevision.into());
            }
            let number = open.document.start_revision(Utc::now())?;
            self.with_db_mut(|conn| DocumentsStore::save(conn, &open.document))?;
            let label = open
                .document
                .revision(number)
                .map(|revision| revision.label())
                .unwrap_or_default();
            Ok(RevisionStartResult { number, label })
        })
        .await
    }

    async fn view_revision(&self, params: RevisionViewParams) -> Result<RevisionViewResult> {
        self.with_open_doc(params.id, |open| {
            match params.revision {
                None => open.session.set_view(ViewSelector::Current),
                Some(number) => {
                    if open.document.revision(number).is_none() {
                        return Err(DocumentError::UnknownRevision(number).into());
                    }
                    open.session.set_view(ViewSelector::Revision(number));
                }
            }
            Ok(RevisionViewResult {
                viewing: open.session.viewing_revision(),
            })
        })
        .await
    }

    async fn list_revisions(&self, doc_id: Uuid) -> Result<Vec<RevisionSummary>> {
        self.with_open_doc(doc_id, |open| {
            Ok(open
                .document
                .revisions
                .iter()
                .map(|revision| RevisionSummary {
                    number: revision.number,
                    label: revision.label(),
                    captured_at: revision.captured_at,
                    item_count: revision.items.iter().filter(|item| !item.deleted).count(),
                })
                .collect())
        })
        .await
    }

    async fn add_item(&self, params: ItemAddParams) -> Result<ItemAddResult> {
        let defaults = self.default_surcharges;
        self.with_open_doc(params.id, |open| {
            Self::ensure_mutable(open)?;
            let item_id = match (params.parent_id, params.kind) {
                (Some(parent_id), _) => open
                    .document
                    .insert_sub_item(parent_id)?
                    .ok_or(RequestError::UnknownParent(parent_id))?,
                (None, Some(AddKind::Category)) => open.document.insert_category()?,
                (None, Some(AddKind::WorkItem)) => open.document.insert_work_item()?,
                (None, None) => return Err(RequestError::MissingKind.into()),
            };
            if let Some(item) = open
                .document
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
            {
                if item.is_work_item() {
                    item.surcharges = defaults;
                }
            }
            open.session.mark_new(item_id);
            Ok(ItemAddResult { item_id })
        })
        .await
    }

    async fn update_item(&self, params: ItemUpdateParams) -> Result<LineItem> {
        // Numeric fields accept formula strings. Evaluate everything
        // before touching the sheet so a bad value leaves the row
        // unchanged.
        let quantity = match &params.quantity {
            None => None,
            Some(serde_json::Value::Null) => Some(None),
            Some(value) => Some(Some(numeric_value(value)?)),
        };
        let unit_price = params.unit_price.as_ref().map(numeric_value).transpose()?;
        if let Some(price) = unit_price {
            if price < 0.0 {
                return Err(SheetError::NegativePrice.into());
            }
        }

        self.with_open_doc(params.id, |open| {
            Self::ensure_mutable(open)?;
            if !open
                .document
                .items
                .iter()
                .any(|item| item.id == params.item_id)
            {
                return Err(SheetError::UnknownItem(params.item_id).into());
            }
            let mut edits: Vec<FieldEdit> = Vec::new();
            if let Some(description) = params.description {
                edits.push(FieldEdit::Description(description));
            }
            if let Some(unit) = params.unit {
                edits.push(FieldEdit::Unit(unit));
            }
            if let Some(quantity) = quantity {
                edits.push(FieldEdit::Quantity(quantity));
            }
            if let Some(price) = unit_price {
                edits.push(FieldEdit::UnitPrice(price));
            }
            if let Some(note) = params.note {
                edits.push(FieldEdit::Note(note));
            }
            if let Some(indent) = params.indent {
                edits.push(FieldEdit::Indent(indent));
            }
            if let Some(surcharges) = params.surcharges {
                edits.push(FieldEdit::Surcharges(surcharges));
            }
            if let Some(breakdown) = params.breakdown {
                edits.push(FieldEdit::Breakdown(breakdown));
            }
            let edited = !edits.is_empty();
            for edit in edits {
                open.document.apply_edit(params.item_id, edit)?;
            }
            if edited {
                open.session.finish_editing(params.item_id);
                open.session.mark_dirty();
            }
            let item = open
                .document
                .items
                .iter()
                .find(|item| item.id == params.item_id)
                .ok_or(SheetError::UnknownItem(params.item_id))?;
            Ok(item.clone())
        })
        .await
    }

    async fn move_item(&self, params: ItemMoveParams) -> Result<ItemMoveResult> {
        self.with_open_doc(params.id, |open| {
            Self::ensure_mutable(open)?;
            let index = open
                .document
                .items
                .iter()
                .position(|item| item.id == params.item_id)
                .ok_or(SheetError::UnknownItem(params.item_id))?;
            let moved = open.document.move_item(index, params.direction)?;
            if moved {
                open.session.mark_dirty();
            }
            Ok(ItemMoveResult { moved })
        })
        .await
    }

    async fn toggle_delete(&self, params: ItemToggleParams) -> Result<ItemToggleResult> {
        self.with_open_doc(params.id, |open| {
            Self::ensure_mutable(open)?;
            let deleted = open.document.toggle_deleted(params.item_id)?;
            open.session.mark_dirty();
            Ok(ItemToggleResult { deleted })
        })
        .await
    }

    async fn search_catalog(&self, params: CatalogSearchParams) -> Result<serde_json::Value> {
        let query = params.query.unwrap_or_default();
        match params.catalog {
            CatalogKind::Price => {
                let entries = self.with_db(|conn| PriceCatalogStore::search(conn, &query))?;
                Ok(json!({ "entries": entries }))
            }
            CatalogKind::Work => {
                let entries = self.with_db(|conn| WorkCatalogStore::search(conn, &query))?;
                Ok(json!({ "entries": entries }))
            }
        }
    }

    async fn upsert_catalog(&self, params: CatalogUpsertParams) -> Result<serde_json::Value> {
        // Fresh entries may omit id and last_updated.
        let mut entry = params.entry;
        if let Some(object) = entry.as_object_mut() {
            object
                .entry("id")
                .or_insert_with(|| json!(Uuid::new_v4()));
            object
                .entry("last_updated")
                .or_insert_with(|| json!(Utc::now()));
        }
        match params.catalog {
            CatalogKind::Price => {
                let entry: PriceCatalogEntry = serde_json::from_value(entry)
                    .map_err(|error| RequestError::BadEntry(error.to_string()))?;
                self.with_db(|conn| PriceCatalogStore::upsert(conn, &entry))?;
                Ok(json!({ "ok": true, "id": entry.id }))
            }
            CatalogKind::Work => {
                let entry: WorkCatalogEntry = serde_json::from_value(entry)
                    .map_err(|error| RequestError::BadEntry(error.to_string()))?;
                self.with_db(|conn| WorkCatalogStore::upsert(conn, &entry))?;
                Ok(json!({ "ok": true, "id": entry.id }))
            }
        }
    }

    async fn import_into_document(&self, params: ImportRowsParams) -> Result<ImportRowsResult> {
        let defaults = self.default_surcharges;
        self.with_open_doc(params.id, |open| {
            Self::ensure_mutable(open)?;
            let mut imported = import_rows(&params.rows)?;
            for item in imported.iter_mut().filter(|item| item.is_work_item()) {
                item.surcharges = defaults;
            }
            let count = imported.len();
            open.document.items.extend(imported);
            if count > 0 {
                open.session.mark_dirty();
            }
            Ok(ImportRowsResult { imported: count })
        })
        .await
    }

    async fn export_document(&self, doc_id: Uuid) -> Result<Vec<ExportRow>> {
        self.with_open_doc(doc_id, |open| {
            let items = match open.session.view() {
                ViewSelector::Current => &open.document.items,
                ViewSelector::Revision(number) => {
                    &open
                        .document
                        .revision(number)
                        .ok_or(DocumentError::UnknownRevision(number))?
                        .items
                }
            };
            Ok(export_rows(items, open.document.kind))
        })
        .await
    }
}

impl Default for RpcServerState {
    fn default() -> Self {
        let meta_db = MetaDb::open(":memory:").expect("in-memory anggar.db should initialize");
        Self::new(meta_db, Arc::new(DisabledGenerator), DefaultsConfig::default())
    }
}

// ── Request validation errors ───────────────────────────────────────

/// Request-shape failures that surface as invalid params.
#[derive(Debug)]
enum RequestError {
    UnknownDocument(Uuid),
    UnknownParent(Uuid),
    MissingKind,
    BadNumericValue(String),
    BadEntry(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::UnknownDocument(id) => write!(f, "no document with id {id}"),
            RequestError::UnknownParent(id) => write!(f, "no parent row with id {id}"),
            RequestError::MissingKind => {
                write!(f, "item.add requires either kind or parent_id")
            }
            RequestError::BadNumericValue(raw) => {
                write!(f, "expected a number or formula string, got {raw}")
            }
            RequestError::BadEntry(reason) => {
                write!(f, "cannot decode catalog entry: {reason}")
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// Cell values arrive as JSON numbers or formula strings like
/// `"=12*0.8"`.
fn numeric_value(value: &serde_json::Value) -> Result<f64> {
    match value {
        serde_json::Value::Number(number) => match number.as_f64() {
            Some(value) => Ok(value),
            None => Err(RequestError::BadNumericValue(number.to_string()).into()),
        },
        serde_json::Value::String(expression) => Ok(formula::eval(expression)?),
        other => Err(RequestError::BadNumericValue(other.to_string()).into()),
    }
}

// ── Method params and results ───────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct DocCreateParams {
    kind: DocumentKind,
    title: String,
    #[serde(default)]
    project_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct DocCreateResult {
    id: Uuid,
}

/// Shared by the methods that only need a document id.
#[derive(Debug, Clone, Deserialize)]
struct DocIdParams {
    id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
struct DocShowResult {
    id: Uuid,
    kind: DocumentKind,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_code: Option<String>,
    status: DocumentStatus,
    locked: bool,
    /// Set when a historical revision is being viewed.
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<u32>,
    items: Vec<LineItem>,
    /// Hierarchical number per visible item id.
    numbers: BTreeMap<String, String>,
    orphaned: Vec<Uuid>,
    /// Subtotal per category id, deep nested rows included.
    subtotals: BTreeMap<String, f64>,
    grand_total: f64,
    session: SessionFlags,
}

#[derive(Debug, Clone, Serialize)]
struct DocSaveResult {
    removed: usize,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
struct DocLockResult {
    locked: bool,
    status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize)]
struct RevisionStartResult {
    number: u32,
    label: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RevisionViewParams {
    id: Uuid,
    /// Omitted or null returns the view to the current sheet.
    #[serde(default)]
    revision: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct RevisionViewResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    viewing: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct RevisionSummary {
    number: u32,
    label: String,
    captured_at: DateTime<Utc>,
    item_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AddKind {
    Category,
    WorkItem,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemAddParams {
    id: Uuid,
    #[serde(default)]
    kind: Option<AddKind>,
    /// When set the new row becomes a sub-item of this work item and
    /// `kind` is ignored.
    #[serde(default)]
    parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
struct ItemAddResult {
    item_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemUpdateParams {
    id: Uuid,
    item_id: Uuid,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    /// Number, formula string, or null to clear.
    #[serde(default)]
    quantity: Option<serde_json::Value>,
    /// Number or formula string.
    #[serde(default)]
    unit_price: Option<serde_json::Value>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    indent: Option<u32>,
    #[serde(default)]
    surcharges: Option<Surcharges>,
    #[serde(default)]
    breakdown: Option<Vec<Component>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemMoveParams {
    id: Uuid,
    item_id: Uuid,
    direction: MoveDirection,
}

#[derive(Debug, Clone, Serialize)]
struct ItemMoveResult {
    moved: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemToggleParams {
    id: Uuid,
    item_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
struct ItemToggleResult {
    deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct PriceResolveParams {
    id: Uuid,
    strategy: PriceStrategy,
    /// Omitted means every priceable row in the document.
    #[serde(default)]
    item_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
struct PriceResolveSingleParams {
    id: Uuid,
    item_id: Uuid,
    strategy: PriceStrategy,
}

#[derive(Debug, Clone, Deserialize)]
struct PriceComponentParams {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CatalogKind {
    Price,
    Work,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogSearchParams {
    catalog: CatalogKind,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogUpsertParams {
    catalog: CatalogKind,
    entry: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ImportRowsParams {
    id: Uuid,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
struct ImportRowsResult {
    imported: usize,
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Handles a raw JSON-RPC request line and returns the response.
pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request: Request = match serde_json::from_slice(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError {
                    code: PARSE_ERROR,
                    message: "Parse error".to_string(),
                    data: Some(json!({ "reason": error.to_string() })),
                },
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return Response::error(
            request.id,
            RpcError {
                code: INVALID_REQUEST,
                message: "Invalid Request".to_string(),
                data: None,
            },
        );
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    match request.method.as_str() {
        "rpc.ping" => Response::success(
            request.id,
            json!({
                "ok": true,
            }),
        ),
        "daemon.shutdown" => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Response::success(
                request.id,
                json!({
                    "ok": true,
                }),
            )
        }
        "doc.create" => handle_doc_create(request, state).await,
        "doc.list" => handle_doc_list(request, state).await,
        "doc.show" => handle_doc_show(request, state).await,
        "doc.save" => handle_doc_save(request, state).await,
        "doc.lock" => handle_doc_lock(request, state).await,
        "doc.revision.start" => handle_revision_start(request, state).await,
        "doc.revision.view" => handle_revision_view(request, state).await,
        "doc.revision.list" => handle_revision_list(request, state).await,
        "item.add" => handle_item_add(request, state).await,
        "item.update" => handle_item_update(request, state).await,
        "item.move" => handle_item_move(request, state).await,
        "item.toggle_delete" => handle_item_toggle_delete(request, state).await,
        "price.resolve" => handle_price_resolve(request, state).await,
        "price.resolve_single" => handle_price_resolve_single(request, state).await,
        "price.component" => handle_price_component(request, state).await,
        "catalog.search" => handle_catalog_search(request, state).await,
        "catalog.upsert" => handle_catalog_upsert(request, state).await,
        "import.rows" => handle_import_rows(request, state).await,
        "export.rows" => handle_export_rows(request, state).await,
        _ => Response::error(
            request.id,
            RpcError {
                code: METHOD_NOT_FOUND,
                message: "Method not found".to_string(),
                data: None,
            },
        ),
    }
}

// ── Method handlers ─────────────────────────────────────────────────

async fn handle_doc_create(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<DocCreateParams>("doc.create", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.create_document(params).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_doc_list(request: Request, state: &RpcServerState) -> Response {
    match state.list_documents().await {
        Ok(documents) => Response::success(request.id, json!({ "documents": documents })),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_doc_show(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<DocIdParams>("doc.show", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.show_document(params.id).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_doc_save(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<DocIdParams>("doc.save", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.save_document(params.id).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_doc_lock(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<DocIdParams>("doc.lock", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.lock_document(params.id).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_revision_start(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<DocIdParams>("doc.revision.start", request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    match state.start_revision(params.id).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_revision_view(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<RevisionViewParams>("doc.revision.view", request.params, &request.id)
        {
            Ok(params) => params,
            Err(response) => return response,
        };
    match state.view_revision(params).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_revision_list(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<DocIdParams>("doc.revision.list", request.params, &request.id)
    {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.list_revisions(params.id).await {
        Ok(revisions) => Response::success(request.id, json!({ "revisions": revisions })),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_item_add(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<ItemAddParams>("item.add", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.add_item(params).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_item_update(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<ItemUpdateParams>("item.update", request.params, &request.id)
    {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.update_item(params).await {
        Ok(item) => Response::success(request.id, json!({ "item": item })),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_item_move(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<ItemMoveParams>("item.move", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.move_item(params).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_item_toggle_delete(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<ItemToggleParams>("item.toggle_delete", request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    match state.toggle_delete(params).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_price_resolve(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<PriceResolveParams>("price.resolve", request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    if let Err(error) = state.ensure_open(params.id).await {
        return error_response(request.id, error);
    }
    match state
        .resolver
        .resolve(params.id, params.item_ids, params.strategy)
        .await
    {
        Ok(report) => Response::success(request.id, json!(report)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_price_resolve_single(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<PriceResolveSingleParams>(
        "price.resolve_single",
        request.params,
        &request.id,
    ) {
        Ok(params) => params,
        Err(response) => return response,
    };
    if let Err(error) = state.ensure_open(params.id).await {
        return error_response(request.id, error);
    }
    match state
        .resolver
        .resolve_single(params.id, params.item_id, params.strategy)
        .await
    {
        Ok(resolution) => Response::success(request.id, json!(resolution)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_price_component(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<PriceComponentParams>("price.component", request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    match state.generator.generate_component_price(&params.name).await {
        Ok(price) => Response::success(request.id, json!(price)),
        Err(error) => error_response(request.id, error.into()),
    }
}

async fn handle_catalog_search(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<CatalogSearchParams>("catalog.search", request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    match state.search_catalog(params).await {
        Ok(result) => Response::success(request.id, result),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_catalog_upsert(request: Request, state: &RpcServerState) -> Response {
    let params =
        match parse_params::<CatalogUpsertParams>("catalog.upsert", request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    match state.upsert_catalog(params).await {
        Ok(result) => Response::success(request.id, result),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_import_rows(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<ImportRowsParams>("import.rows", request.params, &request.id)
    {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.import_into_document(params).await {
        Ok(result) => Response::success(request.id, json!(result)),
        Err(error) => error_response(request.id, error),
    }
}

async fn handle_export_rows(request: Request, state: &RpcServerState) -> Response {
    let params = match parse_params::<DocIdParams>("export.rows", request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.export_document(params.id).await {
        Ok(rows) => Response::success(request.id, json!({ "rows": rows })),
        Err(error) => error_response(request.id, error),
    }
}

// ── Response helpers ────────────────────────────────────────────────

fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<serde_json::Value>,
    request_id: &RequestId,
) -> Result<T, Response> {
    let Some(params) = params else {
        return Err(invalid_params_response(
            request_id.clone(),
            format!("{method} requires params"),
        ));
    };
    serde_json::from_value(params).map_err(|error| {
        invalid_params_response(
            request_id.clone(),
            format!("failed to decode {method} params: {error}"),
        )
    })
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError {
            code: INVALID_PARAMS,
            message: "Invalid params".to_string(),
            data: Some(json!({ "reason": reason })),
        },
    )
}

fn error_response(request_id: RequestId, error: anyhow::Error) -> Response {
    if let Some(reason) = validation_reason(&error) {
        return invalid_params_response(request_id, reason);
    }
    Response::error(
        request_id,
        RpcError {
            code: INTERNAL_ERROR,
            message: "Internal error".to_string(),
            data: Some(json!({ "reason": format!("{error:#}") })),
        },
    )
}

/// Validation failures map to invalid params; everything else stays an
/// internal error.
fn validation_reason(error: &anyhow::Error) -> Option<String> {
    if let Some(document_error) = error.downcast_ref::<DocumentError>() {
        return Some(document_error.to_string());
    }
    if let Some(sheet_error) = error.downcast_ref::<SheetError>() {
        return Some(sheet_error.to_string());
    }
    if let Some(formula_error) = error.downcast_ref::<FormulaError>() {
        return Some(formula_error.to_string());
    }
    if let Some(import_error) = error.downcast_ref::<ImportError>() {
        return Some(import_error.to_string());
    }
    if let Some(catalog_error) = error.downcast_ref::<CatalogError>() {
        return Some(catalog_error.to_string());
    }
    if let Some(request_error) = error.downcast_ref::<RequestError>() {
        return Some(request_error.to_string());
    }
    if let Some(GeneratorError::Disabled) = error.downcast_ref::<GeneratorError>() {
        return Some(GeneratorError::Disabled.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anggar_common::protocol::methods::IMPLEMENTED_METHODS;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_db_path() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be past the epoch")
            .as_nanos();
        let counter = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("anggar-rpc-{nanos}-{counter}.db"))
    }

    fn cleanup_db(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    async fn call(state: &RpcServerState, method: &str, params: serde_json::Value) -> Response {
        let request = Request::new(method, Some(params), RequestId::Number(1));
        dispatch_request(request, state).await
    }

    fn result(response: Response) -> serde_json::Value {
        assert!(
            response.error.is_none(),
            "expected success, got {:?}",
            response.error
        );
        response.result.expect("success response should carry a result")
    }

    fn error_reason(response: Response) -> (i32, String) {
        let error = response.error.expect("expected an error response");
        let reason = error
            .data
            .as_ref()
            .and_then(|data| data["reason"].as_str())
            .unwrap_or_default()
            .to_string();
        (error.code, reason)
    }

    async fn create_doc(state: &RpcServerState, kind: &str) -> Uuid {
        let value = result(
            call(
                state,
                "doc.create",
                json!({ "kind": kind, "title": "Renovasi kantor" }),
            )
            .await,
        );
        serde_json::from_value(value["id"].clone()).expect("doc id should decode")
    }

    async fn add_item(state: &RpcServerState, doc_id: Uuid, kind: &str) -> Uuid {
        let value = result(
            call(state, "item.add", json!({ "id": doc_id, "kind": kind })).await,
        );
        serde_json::from_value(value["item_id"].clone()).expect("item id should decode")
    }

    #[tokio::test]
    async fn ping_reports_ok() {
        let state = RpcServerState::default();
        let value = result(call(&state, "rpc.ping", json!({})).await);
        assert_eq!(value["ok"], json!(true));
    }

    #[tokio::test]
    async fn every_implemented_method_is_dispatched() {
        let state = RpcServerState::default();
        for method in IMPLEMENTED_METHODS {
            let request = Request::new(*method, None, RequestId::Number(7));
            let response = dispatch_request(request, &state).await;
            if let Some(error) = &response.error {
                assert_ne!(
                    error.code, METHOD_NOT_FOUND,
                    "{method} should be dispatched"
                );
            }
        }
    }

    #[tokio::test]
    async fn unknown_method_reports_method_not_found() {
        let state = RpcServerState::default();
        let (code, _) = error_reason(call(&state, "doc.destroy", json!({})).await);
        assert_eq!(code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_reports_parse_error() {
        let state = RpcServerState::default();
        let response = handle_raw_request(b"{not json", &state).await;
        let error = response.error.expect("expected an error");
        assert_eq!(error.code, PARSE_ERROR);
        assert_eq!(response.id, RequestId::Null);
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_rejected() {
        let state = RpcServerState::default();
        let raw = br#"{"jsonrpc":"1.0","method":"rpc.ping","id":1}"#;
        let response = handle_raw_request(raw, &state).await;
        let error = response.error.expect("expected an error");
        assert_eq!(error.code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn create_then_show_round_trips() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["kind"], json!("rab"));
        assert_eq!(shown["title"], json!("Renovasi kantor"));
        assert_eq!(shown["status"], json!("draft"));
        assert_eq!(shown["locked"], json!(false));
        assert_eq!(shown["items"], json!([]));
        assert_eq!(shown["grand_total"], json!(0.0));
        assert_eq!(shown["session"]["dirty"], json!(false));
    }

    #[tokio::test]
    async fn unknown_document_is_invalid_params() {
        let state = RpcServerState::default();
        let (code, reason) = error_reason(
            call(&state, "doc.show", json!({ "id": Uuid::new_v4() })).await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("no document"), "unexpected reason: {reason}");
    }

    #[tokio::test]
    async fn missing_params_are_invalid_params() {
        let state = RpcServerState::default();
        let request = Request::new("doc.show", None, RequestId::Number(3));
        let (code, reason) = error_reason(dispatch_request(request, &state).await);
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("doc.show requires params"));
    }

    #[tokio::test]
    async fn numbering_and_subtotals_flow_through_show() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;

        let category = add_item(&state, doc_id, "category").await;
        let work = add_item(&state, doc_id, "work_item").await;
        result(
            call(
                &state,
                "item.update",
                json!({
                    "id": doc_id,
                    "item_id": work,
                    "description": "Galian tanah",
                    "indent": 1,
                    "quantity": "=4*2.5",
                    "unit_price": 12_500,
                }),
            )
            .await,
        );

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["numbers"][category.to_string()], json!("I"));
        assert_eq!(shown["numbers"][work.to_string()], json!("I.1"));
        assert_eq!(shown["subtotals"][category.to_string()], json!(125_000.0));
        assert_eq!(shown["grand_total"], json!(125_000.0));
        assert_eq!(shown["session"]["dirty"], json!(true));
    }

    #[tokio::test]
    async fn update_with_bad_formula_leaves_the_row_unchanged() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let work = add_item(&state, doc_id, "work_item").await;

        let (code, _) = error_reason(
            call(
                &state,
                "item.update",
                json!({
                    "id": doc_id,
                    "item_id": work,
                    "description": "Pasangan bata",
                    "quantity": "=2*",
                }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"][0]["description"], json!(""));
        assert_eq!(shown["items"][0]["quantity"], json!(null));
    }

    #[tokio::test]
    async fn negative_price_is_rejected_before_any_edit() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let work = add_item(&state, doc_id, "work_item").await;

        let (code, reason) = error_reason(
            call(
                &state,
                "item.update",
                json!({
                    "id": doc_id,
                    "item_id": work,
                    "description": "Urugan pasir",
                    "unit_price": -5.0,
                }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("negative"), "unexpected reason: {reason}");

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"][0]["description"], json!(""));
    }

    #[tokio::test]
    async fn sub_items_require_an_existing_parent() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let work = add_item(&state, doc_id, "work_item").await;

        let value = result(
            call(
                &state,
                "item.add",
                json!({ "id": doc_id, "parent_id": work }),
            )
            .await,
        );
        assert!(value["item_id"].is_string());

        let (code, reason) = error_reason(
            call(
                &state,
                "item.add",
                json!({ "id": doc_id, "parent_id": Uuid::new_v4() }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("no parent row"), "unexpected reason: {reason}");
    }

    #[tokio::test]
    async fn move_and_toggle_delete_round_trip() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let first = add_item(&state, doc_id, "work_item").await;
        let second = add_item(&state, doc_id, "work_item").await;

        let moved = result(
            call(
                &state,
                "item.move",
                json!({ "id": doc_id, "item_id": second, "direction": "up" }),
            )
            .await,
        );
        assert_eq!(moved["moved"], json!(true));

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"][0]["id"], json!(second.to_string()));
        assert_eq!(shown["items"][1]["id"], json!(first.to_string()));

        let toggled = result(
            call(
                &state,
                "item.toggle_delete",
                json!({ "id": doc_id, "item_id": first }),
            )
            .await,
        );
        assert_eq!(toggled["deleted"], json!(true));
    }

    #[tokio::test]
    async fn save_persists_and_reloads_from_the_store() {
        let path = unique_db_path();
        let meta_db = MetaDb::open(&path).expect("meta db should open");
        let state = RpcServerState::new(
            meta_db,
            Arc::new(DisabledGenerator),
            DefaultsConfig::default(),
        );

        let doc_id = create_doc(&state, "rab").await;
        let work = add_item(&state, doc_id, "work_item").await;
        result(
            call(
                &state,
                "item.update",
                json!({
                    "id": doc_id,
                    "item_id": work,
                    "description": "Pekerjaan pondasi",
                }),
            )
            .await,
        );
        result(call(&state, "doc.save", json!({ "id": doc_id })).await);

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["session"]["dirty"], json!(false));

        // A fresh state over the same file sees the saved sheet.
        let reopened = MetaDb::open(&path).expect("meta db should reopen");
        let fresh = RpcServerState::new(
            reopened,
            Arc::new(DisabledGenerator),
            DefaultsConfig::default(),
        );
        let listed = result(call(&fresh, "doc.list", json!({})).await);
        assert_eq!(listed["documents"].as_array().map(Vec::len), Some(1));
        let shown = result(call(&fresh, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"][0]["description"], json!("Pekerjaan pondasi"));

        drop(state);
        drop(fresh);
        cleanup_db(&path);
    }

    #[tokio::test]
    async fn lock_rejects_unsaved_changes() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        add_item(&state, doc_id, "work_item").await;

        let (code, reason) = error_reason(call(&state, "doc.lock", json!({ "id": doc_id })).await);
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("unsaved"), "unexpected reason: {reason}");

        result(call(&state, "doc.save", json!({ "id": doc_id })).await);
        let locked = result(call(&state, "doc.lock", json!({ "id": doc_id })).await);
        assert_eq!(locked["locked"], json!(true));
        assert_eq!(locked["status"], json!("final"));

        let (code, reason) = error_reason(
            call(&state, "item.add", json!({ "id": doc_id, "kind": "work_item" })).await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("locked"), "unexpected reason: {reason}");
    }

    #[tokio::test]
    async fn revision_flow_snapshots_and_gates_mutations() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let work = add_item(&state, doc_id, "work_item").await;
        result(
            call(
                &state,
                "item.update",
                json!({ "id": doc_id, "item_id": work, "description": "Atap baja ringan" }),
            )
            .await,
        );
        result(call(&state, "doc.save", json!({ "id": doc_id })).await);
        result(call(&state, "doc.lock", json!({ "id": doc_id })).await);

        let started = result(call(&state, "doc.revision.start", json!({ "id": doc_id })).await);
        assert_eq!(started["number"], json!(1));
        assert_eq!(started["label"], json!("Revisi 1"));

        // Reopened for editing: change the current sheet.
        result(
            call(
                &state,
                "item.update",
                json!({ "id": doc_id, "item_id": work, "description": "Atap genteng beton" }),
            )
            .await,
        );

        let viewing = result(
            call(
                &state,
                "doc.revision.view",
                json!({ "id": doc_id, "revision": 1 }),
            )
            .await,
        );
        assert_eq!(viewing["viewing"], json!(1));

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["revision"], json!(1));
        assert_eq!(shown["items"][0]["description"], json!("Atap baja ringan"));

        let (code, reason) = error_reason(
            call(
                &state,
                "item.update",
                json!({ "id": doc_id, "item_id": work, "description": "x" }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("revision"), "unexpected reason: {reason}");

        result(call(&state, "doc.revision.view", json!({ "id": doc_id })).await);
        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"][0]["description"], json!("Atap genteng beton"));

        let listed = result(call(&state, "doc.revision.list", json!({ "id": doc_id })).await);
        assert_eq!(listed["revisions"][0]["number"], json!(1));
        assert_eq!(listed["revisions"][0]["item_count"], json!(1));
    }

    #[tokio::test]
    async fn viewing_a_missing_revision_is_invalid_params() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let (code, reason) = error_reason(
            call(
                &state,
                "doc.revision.view",
                json!({ "id": doc_id, "revision": 9 }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("no revision 9"), "unexpected reason: {reason}");
    }

    #[tokio::test]
    async fn import_rejects_a_bad_header() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let (code, _) = error_reason(
            call(
                &state,
                "import.rows",
                json!({ "id": doc_id, "rows": [["foo", "bar"]] }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"], json!([]));
    }

    #[tokio::test]
    async fn import_then_export_round_trips() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "rab").await;
        let imported = result(
            call(
                &state,
                "import.rows",
                json!({
                    "id": doc_id,
                    "rows": [
                        ["Description", "Unit", "Quantity", "Unit_Price", "Note"],
                        ["PEKERJAAN TANAH", "", "", "", ""],
                        ["Galian tanah biasa", "m3", "12", "45000", ""],
                    ],
                }),
            )
            .await,
        );
        assert_eq!(imported["imported"], json!(2));

        let exported = result(call(&state, "export.rows", json!({ "id": doc_id })).await);
        let rows = exported["rows"].as_array().expect("rows should be an array");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["kind"], json!("category"));
        assert_eq!(rows[1]["amount"], json!(540_000.0));
        assert_eq!(rows.last().map(|row| row["kind"].clone()), Some(json!("grand_total")));
    }

    #[tokio::test]
    async fn bq_export_hides_price_columns() {
        let state = RpcServerState::default();
        let doc_id = create_doc(&state, "bq").await;
        result(
            call(
                &state,
                "import.rows",
                json!({
                    "id": doc_id,
                    "rows": [
                        ["description", "unit", "quantity", "note"],
                        ["Bekisting kolom", "m2", "8", ""],
                    ],
                }),
            )
            .await,
        );

        let exported = result(call(&state, "export.rows", json!({ "id": doc_id })).await);
        let rows = exported["rows"].as_array().expect("rows should be an array");
        let work_row = &rows[0];
        assert_eq!(work_row["quantity"], json!(8.0));
        assert_eq!(work_row["unit_price"], json!(null));
        assert_eq!(work_row["amount"], json!(null));
    }

    #[tokio::test]
    async fn catalog_upsert_search_and_duplicate_rejection() {
        let state = RpcServerState::default();
        let upserted = result(
            call(
                &state,
                "catalog.upsert",
                json!({
                    "catalog": "price",
                    "entry": {
                        "name": "Semen portland 50kg",
                        "category": "material",
                        "unit": "sak",
                        "unit_price": 72_000.0,
                    },
                }),
            )
            .await,
        );
        assert_eq!(upserted["ok"], json!(true));

        let found = result(
            call(
                &state,
                "catalog.search",
                json!({ "catalog": "price", "query": "semen" }),
            )
            .await,
        );
        assert_eq!(found["entries"].as_array().map(Vec::len), Some(1));
        assert_eq!(found["entries"][0]["name"], json!("Semen portland 50kg"));

        let (code, reason) = error_reason(
            call(
                &state,
                "catalog.upsert",
                json!({
                    "catalog": "price",
                    "entry": {
                        "name": "SEMEN PORTLAND 50KG",
                        "category": "material",
                        "unit": "sak",
                        "unit_price": 75_000.0,
                    },
                }),
            )
            .await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("already has an entry"), "unexpected reason: {reason}");
    }

    #[tokio::test]
    async fn price_resolve_applies_catalog_prices_over_rpc() {
        let state = RpcServerState::default();
        result(
            call(
                &state,
                "catalog.upsert",
                json!({
                    "catalog": "work",
                    "entry": {
                        "name": "Pasangan bata merah",
                        "category": "struktur",
                        "unit": "m2",
                        "default_price": 185_000.0,
                        "source": "database",
                    },
                }),
            )
            .await,
        );

        let doc_id = create_doc(&state, "rab").await;
        let work = add_item(&state, doc_id, "work_item").await;
        result(
            call(
                &state,
                "item.update",
                json!({
                    "id": doc_id,
                    "item_id": work,
                    "description": "Pasangan bata merah",
                    "quantity": 20,
                }),
            )
            .await,
        );

        let report = result(
            call(
                &state,
                "price.resolve",
                json!({ "id": doc_id, "strategy": "database" }),
            )
            .await,
        );
        assert_eq!(report["resolved"], json!([work.to_string()]));
        assert_eq!(report["unresolved"], json!([]));

        let shown = result(call(&state, "doc.show", json!({ "id": doc_id })).await);
        assert_eq!(shown["items"][0]["unit_price"], json!(185_000.0));
        assert_eq!(shown["items"][0]["price_source"], json!("database"));
    }

    #[tokio::test]
    async fn price_component_without_assistant_is_invalid_params() {
        let state = RpcServerState::default();
        let (code, reason) = error_reason(
            call(&state, "price.component", json!({ "name": "Semen" })).await,
        );
        assert_eq!(code, INVALID_PARAMS);
        assert!(reason.contains("disabled"), "unexpected reason: {reason}");
    }
}
