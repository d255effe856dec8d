// RPC method name constants for the daemon socket protocol.

// ── Daemon-internal ────────────────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";

// ── Document ───────────────────────────────────────────────────────
pub const DOC_CREATE: &str = "doc.create";
pub const DOC_LIST: &str = "doc.list";
pub const DOC_SHOW: &str = "doc.show";
pub const DOC_SAVE: &str = "doc.save";
pub const DOC_LOCK: &str = "doc.lock";
pub const DOC_REVISION_START: &str = "doc.revision.start";
pub const DOC_REVISION_VIEW: &str = "doc.revision.view";
pub const DOC_REVISION_LIST: &str = "doc.revision.list";

// ── Line items ─────────────────────────────────────────────────────
pub const ITEM_ADD: &str = "item.add";
pub const ITEM_UPDATE: &str = "item.update";
pub const ITEM_MOVE: &str = "item.move";
pub const ITEM_TOGGLE_DELETE: &str = "item.toggle_delete";

// ── Pricing ────────────────────────────────────────────────────────
pub const PRICE_RESOLVE: &str = "price.resolve";
pub const PRICE_RESOLVE_SINGLE: &str = "price.resolve_single";
pub const PRICE_COMPONENT: &str = "price.component";

// ── Catalogs ───────────────────────────────────────────────────────
pub const CATALOG_SEARCH: &str = "catalog.search";
pub const CATALOG_UPSERT: &str = "catalog.upsert";

// ── Exchange ───────────────────────────────────────────────────────
pub const IMPORT_ROWS: &str = "import.rows";
pub const EXPORT_ROWS: &str = "export.rows";

/// All methods the daemon currently dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DAEMON_SHUTDOWN,
    DOC_CREATE,
    DOC_LIST,
    DOC_SHOW,
    DOC_SAVE,
    DOC_LOCK,
    DOC_REVISION_START,
    DOC_REVISION_VIEW,
    DOC_REVISION_LIST,
    ITEM_ADD,
    ITEM_UPDATE,
    ITEM_MOVE,
    ITEM_TOGGLE_DELETE,
    PRICE_RESOLVE,
    PRICE_RESOLVE_SINGLE,
    PRICE_COMPONENT,
    CATALOG_SEARCH,
    CATALOG_UPSERT,
    IMPORT_ROWS,
    EXPORT_ROWS,
];
