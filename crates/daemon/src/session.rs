// Per-document editor session state.
//
// Row-level UI flags (mid-edit, freshly inserted, waiting on a price
// resolution) and the revision-view selector are not part of the
// persisted document. They live here, keyed by item id, and vanish when
// the document is closed.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use anggar_common::document::Document;

/// Which version of the sheet reads source from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewSelector {
    #[default]
    Current,
    /// 1-based revision number.
    Revision(u32),
}

#[derive(Debug, Default, Clone)]
pub struct EditorSession {
    editing: HashSet<Uuid>,
    fresh: HashSet<Uuid>,
    pricing_loading: HashSet<Uuid>,
    dirty: bool,
    view: ViewSelector,
}

/// Serializable projection of the session for `doc.show` responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionFlags {
    pub editing: Vec<Uuid>,
    pub new: Vec<Uuid>,
    pub pricing_loading: Vec<Uuid>,
    pub dirty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewing_revision: Option<u32>,
}

impl EditorSession {
    // ── Row edit flags ──────────────────────────────────────────────

    /// A freshly inserted row starts out in edit mode.
    pub fn mark_new(&mut self, id: Uuid) {
        self.fresh.insert(id);
        self.editing.insert(id);
        self.dirty = true;
    }

    pub fn mark_editing(&mut self, id: Uuid) {
        self.editing.insert(id);
    }

    pub fn finish_editing(&mut self, id: Uuid) {
        self.editing.remove(&id);
        self.fresh.remove(&id);
    }

    pub fn is_editing(&self, id: Uuid) -> bool {
        self.editing.contains(&id)
    }

    // ── Pricing-in-flight flags ─────────────────────────────────────

    pub fn begin_pricing(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        self.pricing_loading.extend(ids);
    }

    /// Always called on every completion path, success or not. A row
    /// must never stay in its loading state after the resolver returns.
    pub fn finish_pricing(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        for id in ids {
            self.pricing_loading.remove(&id);
        }
    }

    pub fn is_pricing(&self, id: Uuid) -> bool {
        self.pricing_loading.contains(&id)
    }

    // ── Dirty flag ──────────────────────────────────────────────────

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called after a successful save; also drops the row edit flags.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
        self.editing.clear();
        self.fresh.clear();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ── View selector ───────────────────────────────────────────────

    pub fn set_view(&mut self, view: ViewSelector) {
        self.view = view;
    }

    pub fn view(&self) -> ViewSelector {
        self.view
    }

    pub fn viewing_revision(&self) -> Option<u32> {
        match self.view {
            ViewSelector::Current => None,
            ViewSelector::Revision(number) => Some(number),
        }
    }

    // ── Projection ──────────────────────────────────────────────────

    pub fn flags(&self) -> SessionFlags {
        let mut editing: Vec<Uuid> = self.editing.iter().copied().collect();
        let mut new: Vec<Uuid> = self.fresh.iter().copied().collect();
        let mut pricing_loading: Vec<Uuid> = self.pricing_loading.iter().copied().collect();
        editing.sort();
        new.sort();
        pricing_loading.sort();
        SessionFlags {
            editing,
            new,
            pricing_loading,
            dirty: self.dirty,
            viewing_revision: self.viewing_revision(),
        }
    }
}

/// A document held in memory by the daemon, with its session state.
#[derive(Debug, Clone)]
pub struct OpenDocument {
    pub document: Document,
    pub session: EditorSession,
}

impl OpenDocument {
    pub fn new(document: Document) -> Self {
        Self { document, session: EditorSession::default() }
    }
}
