// Document: a cost sheet plus its lifecycle state machine.
//
// Draft documents accept mutations. Locking freezes the sheet as a
// deliverable; reopening a locked document pushes a full snapshot into
// the revision history and returns it to draft. Snapshots are
// immutable once pushed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::sheet::{self, FieldEdit, MoveDirection, SheetError};
use crate::types::{DocumentKind, DocumentStatus, LineItem, Revision};

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("document is locked")]
    Locked,

    #[error("document is not locked")]
    NotLocked,

    #[error("a historical revision is being viewed")]
    ViewingRevision,

    #[error("document has unsaved changes")]
    UnsavedChanges,

    #[error("no revision {0}")]
    UnknownRevision(u32),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    pub project_code: Option<String>,
    pub status: DocumentStatus,
    pub locked: bool,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(kind: DocumentKind, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Document {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            project_code: None,
            status: DocumentStatus::Draft,
            locked: false,
            items: Vec::new(),
            revisions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ensure_unlocked(&self) -> Result<(), DocumentError> {
        if self.locked {
            Err(DocumentError::Locked)
        } else {
            Ok(())
        }
    }

    // ── Sheet mutations, gated on the lock ──────────────────────────

    pub fn insert_category(&mut self) -> Result<Uuid, DocumentError> {
        self.ensure_unlocked()?;
        Ok(sheet::append_category(&mut self.items))
    }

    pub fn insert_work_item(&mut self) -> Result<Uuid, DocumentError> {
        self.ensure_unlocked()?;
        Ok(sheet::append_work_item(&mut self.items))
    }

    /// `Ok(None)` when the parent id is unknown.
    pub fn insert_sub_item(&mut self, parent_id: Uuid) -> Result<Option<Uuid>, DocumentError> {
        self.ensure_unlocked()?;
        Ok(sheet::insert_sub_item(&mut self.items, parent_id))
    }

    pub fn move_item(
        &mut self,
        index: usize,
        direction: MoveDirection,
    ) -> Result<bool, DocumentError> {
        self.ensure_unlocked()?;
        Ok(sheet::move_item(&mut self.items, index, direction))
    }

    pub fn toggle_deleted(&mut self, id: Uuid) -> Result<bool, DocumentError> {
        self.ensure_unlocked()?;
        Ok(sheet::toggle_deleted(&mut self.items, id)?)
    }

    pub fn apply_edit(&mut self, id: Uuid, edit: FieldEdit) -> Result<(), DocumentError> {
        self.ensure_unlocked()?;
        Ok(sheet::apply_edit(&mut self.items, id, edit)?)
    }

    /// Save-time cleanup: drops soft-deleted rows for good and stamps
    /// the document. Returns how many rows were removed.
    pub fn commit(&mut self, now: DateTime<Utc>) -> Result<usize, DocumentError> {
        self.ensure_unlocked()?;
        let removed = sheet::strip_deleted(&mut self.items);
        self.updated_at = now;
        Ok(removed)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Draft → Final. The caller is responsible for refusing to lock
    /// over unsaved changes; the document itself only tracks the flag.
    pub fn lock(&mut self, now: DateTime<Utc>) -> Result<(), DocumentError> {
        self.ensure_unlocked()?;
        self.locked = true;
        self.status = DocumentStatus::Final;
        self.updated_at = now;
        Ok(())
    }

    /// Final → Draft, capturing the current sheet as the next numbered
    /// revision. Only valid on a locked document. Returns the new
    /// revision number.
    pub fn start_revision(&mut self, now: DateTime<Utc>) -> Result<u32, DocumentError> {
        if !self.locked {
            return Err(DocumentError::NotLocked);
        }
        let number = self.revisions.len() as u32 + 1;
        self.revisions.push(Revision {
            number,
            captured_at: now,
            items: self.items.clone(),
        });
        self.locked = false;
        self.status = DocumentStatus::Draft;
        self.updated_at = now;
        Ok(number)
    }

    /// Revision by its 1-based number.
    pub fn revision(&self, number: u32) -> Option<&Revision> {
        number
            .checked_sub(1)
            .and_then(|index| self.revisions.get(index as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemKind;

    fn draft() -> Document {
        Document::new(DocumentKind::Rab, "Renovasi kantor", Utc::now())
    }

    fn locked() -> Document {
        let mut doc = draft();
        doc.insert_category().unwrap();
        doc.lock(Utc::now()).unwrap();
        doc
    }

    // ── Lock gating ─────────────────────────────────────────────────

    #[test]
    fn locked_documents_reject_every_mutation() {
        let mut doc = locked();
        let before = doc.items.clone();
        let id = before[0].id;

        assert_eq!(doc.insert_category(), Err(DocumentError::Locked));
        assert_eq!(doc.insert_work_item(), Err(DocumentError::Locked));
        assert_eq!(doc.insert_sub_item(id), Err(DocumentError::Locked));
        assert_eq!(
            doc.move_item(0, MoveDirection::Down),
            Err(DocumentError::Locked)
        );
        assert_eq!(doc.toggle_deleted(id), Err(DocumentError::Locked));
        assert_eq!(
            doc.apply_edit(id, FieldEdit::Note("x".into())),
            Err(DocumentError::Locked)
        );
        assert_eq!(doc.commit(Utc::now()), Err(DocumentError::Locked));

        assert_eq!(doc.items, before);
    }

    #[test]
    fn locking_twice_fails() {
        let mut doc = locked();
        assert_eq!(doc.lock(Utc::now()), Err(DocumentError::Locked));
    }

    #[test]
    fn locking_marks_the_document_final() {
        let mut doc = draft();
        assert_eq!(doc.status, DocumentStatus::Draft);
        doc.lock(Utc::now()).unwrap();
        assert!(doc.locked);
        assert_eq!(doc.status, DocumentStatus::Final);
    }

    // ── Revisions ───────────────────────────────────────────────────

    #[test]
    fn revising_requires_a_locked_document() {
        let mut doc = draft();
        assert!(matches!(
            doc.start_revision(Utc::now()),
            Err(DocumentError::NotLocked)
        ));
    }

    #[test]
    fn revising_snapshots_and_unlocks() {
        let mut doc = locked();
        let snapshot_items = doc.items.clone();

        assert_eq!(doc.start_revision(Utc::now()), Ok(1));
        assert_eq!(doc.revisions[0].label(), "Revisi 1");

        assert!(!doc.locked);
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.revisions.len(), 1);
        assert_eq!(doc.revisions[0].items, snapshot_items);
    }

    #[test]
    fn snapshots_are_immune_to_later_edits() {
        let mut doc = locked();
        doc.start_revision(Utc::now()).unwrap();
        let id = doc.items[0].id;
        let frozen = doc.revisions[0].items.clone();

        doc.apply_edit(id, FieldEdit::Description("changed".into()))
            .unwrap();
        doc.insert_work_item().unwrap();

        assert_eq!(doc.revisions[0].items, frozen);
        assert_ne!(doc.items, frozen);
    }

    #[test]
    fn revision_numbers_increment_across_cycles() {
        let mut doc = draft();
        doc.insert_category().unwrap();

        for expected in 1..=3u32 {
            doc.lock(Utc::now()).unwrap();
            assert_eq!(doc.start_revision(Utc::now()), Ok(expected));
        }
        assert_eq!(doc.revision(2).map(|r| r.number), Some(2));
        assert_eq!(doc.revision(0), None);
        assert_eq!(doc.revision(9), None);
    }

    // ── Commit ──────────────────────────────────────────────────────

    #[test]
    fn commit_strips_soft_deleted_rows() {
        let mut doc = draft();
        let keep = doc.insert_work_item().unwrap();
        let drop = doc.insert_work_item().unwrap();
        doc.toggle_deleted(drop).unwrap();

        assert_eq!(doc.commit(Utc::now()), Ok(1));
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].id, keep);
    }

    #[test]
    fn sub_items_insert_through_the_document() {
        let mut doc = draft();
        let parent = doc.insert_category().unwrap();
        let child = doc.insert_sub_item(parent).unwrap();
        assert!(child.is_some());
        assert_eq!(doc.items[1].kind, ItemKind::Category);
        assert_eq!(doc.items[1].indent, 1);

        assert_eq!(doc.insert_sub_item(Uuid::new_v4()), Ok(None));
    }
}
