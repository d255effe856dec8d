// Sequence operations on the cost sheet.
//
// These are the raw mutations over the flat row list: appends, sub-row
// placement, block moves, soft-delete, and field edits. Lifecycle
// gating (lock, revision view) lives one layer up in `document`; these
// functions assume the caller already holds the right to mutate.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::outline::Outline;
use crate::types::{Component, ItemKind, LineItem, PriceSource, Surcharges};

#[derive(Debug, Error, PartialEq)]
pub enum SheetError {
    #[error("no row with id {0}")]
    UnknownItem(Uuid),

    #[error("unit price cannot be negative")]
    NegativePrice,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

/// A typed single-field mutation. Formula strings are evaluated at the
/// protocol boundary; by the time an edit reaches the sheet the value
/// is already numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Description(String),
    Unit(String),
    Quantity(Option<f64>),
    UnitPrice(f64),
    Note(String),
    Indent(u32),
    Surcharges(Surcharges),
    Breakdown(Vec<Component>),
}

/// Appends a new empty category at indent 0.
pub fn append_category(items: &mut Vec<LineItem>) -> Uuid {
    let item = LineItem::new_category("");
    let id = item.id;
    items.push(item);
    id
}

/// Appends a new empty work item at indent 0.
pub fn append_work_item(items: &mut Vec<LineItem>) -> Uuid {
    let item = LineItem::new_work_item("");
    let id = item.id;
    items.push(item);
    id
}

/// Inserts a new row of the parent's kind at `parent.indent + 1`,
/// immediately after the parent's existing descendant block. Returns
/// `None` without touching the sheet when the parent id is unknown.
pub fn insert_sub_item(items: &mut Vec<LineItem>, parent_id: Uuid) -> Option<Uuid> {
    let parent_pos = items.iter().position(|item| item.id == parent_id)?;
    let insert_at = Outline::build(items).block_end(parent_pos);

    let parent = &items[parent_pos];
    let mut child = match parent.kind {
        ItemKind::Category => LineItem::new_category(""),
        ItemKind::WorkItem => LineItem::new_work_item(""),
    };
    child.indent = parent.indent + 1;

    let id = child.id;
    items.insert(insert_at, child);
    Some(id)
}

/// Moves the row at `index` together with its descendant block,
/// swapping places with the adjacent sibling block in the requested
/// direction. Returns `false` (sheet untouched) at sequence
/// boundaries, for orphan rows, and when malformed indentation leaves
/// the sibling blocks non-adjacent.
pub fn move_item(items: &mut [LineItem], index: usize, direction: MoveDirection) -> bool {
    if index >= items.len() {
        return false;
    }
    let outline = Outline::build(items);

    match direction {
        MoveDirection::Up => {
            let Some(prev) = outline.prev_sibling(index) else {
                return false;
            };
            if outline.block_end(prev) != index {
                return false;
            }
            let end = outline.block_end(index);
            items[prev..end].rotate_left(index - prev);
            true
        }
        MoveDirection::Down => {
            let Some(next) = outline.next_sibling(index) else {
                return false;
            };
            if outline.block_end(index) != next {
                return false;
            }
            let end = outline.block_end(next);
            items[index..end].rotate_left(next - index);
            true
        }
    }
}

/// Flips the soft-delete flag; returns the new state. The row stays in
/// the sequence until `strip_deleted` runs at commit time.
pub fn toggle_deleted(items: &mut [LineItem], id: Uuid) -> Result<bool, SheetError> {
    let item = find_mut(items, id)?;
    item.deleted = !item.deleted;
    Ok(item.deleted)
}

/// Applies a typed field edit. Setting the unit price by hand records
/// manual provenance so a later resolver pass can tell the two apart.
pub fn apply_edit(items: &mut [LineItem], id: Uuid, edit: FieldEdit) -> Result<(), SheetError> {
    if let FieldEdit::UnitPrice(value) = edit {
        if value < 0.0 {
            return Err(SheetError::NegativePrice);
        }
    }

    let item = find_mut(items, id)?;
    match edit {
        FieldEdit::Description(value) => item.description = value,
        FieldEdit::Unit(value) => item.unit = value,
        FieldEdit::Quantity(value) => item.quantity = value,
        FieldEdit::UnitPrice(value) => {
            item.unit_price = value;
            item.price_source = Some(PriceSource::Manual);
        }
        FieldEdit::Note(value) => item.note = value,
        FieldEdit::Indent(value) => item.indent = value,
        FieldEdit::Surcharges(value) => item.surcharges = value,
        FieldEdit::Breakdown(value) => item.breakdown = value,
    }
    Ok(())
}

/// Permanently removes soft-deleted rows. Returns how many were
/// dropped.
pub fn strip_deleted(items: &mut Vec<LineItem>) -> usize {
    let before = items.len();
    items.retain(|item| !item.deleted);
    before - items.len()
}

fn find_mut(items: &mut [LineItem], id: Uuid) -> Result<&mut LineItem, SheetError> {
    items
        .iter_mut()
        .find(|item| item.id == id)
        .ok_or(SheetError::UnknownItem(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(description: &str, indent: u32) -> LineItem {
        let mut item = LineItem::new_category(description);
        item.indent = indent;
        item
    }

    fn work_item(description: &str, indent: u32) -> LineItem {
        let mut item = LineItem::new_work_item(description);
        item.indent = indent;
        item
    }

    fn descriptions(items: &[LineItem]) -> Vec<&str> {
        items.iter().map(|item| item.description.as_str()).collect()
    }

    // ── Insertion ───────────────────────────────────────────────────

    #[test]
    fn appends_land_at_top_level() {
        let mut items = vec![category("A", 0), work_item("a1", 1)];
        append_work_item(&mut items);
        append_category(&mut items);

        assert_eq!(items.len(), 4);
        assert_eq!(items[2].kind, ItemKind::WorkItem);
        assert_eq!(items[2].indent, 0);
        assert_eq!(items[3].kind, ItemKind::Category);
        assert_eq!(items[3].indent, 0);
    }

    #[test]
    fn sub_item_lands_after_the_last_existing_child() {
        let mut items = vec![
            work_item("parent", 0),
            work_item("first", 1),
            work_item("second", 1),
            work_item("unrelated", 0),
        ];
        let parent_id = items[0].id;
        let new_id = insert_sub_item(&mut items, parent_id).unwrap();

        assert_eq!(items[3].id, new_id);
        assert_eq!(items[3].indent, 1);
        assert_eq!(items[4].description, "unrelated");
    }

    #[test]
    fn sub_item_lands_after_the_whole_descendant_block() {
        let mut items = vec![
            category("parent", 0),
            category("child", 1),
            work_item("grandchild", 2),
            category("other", 0),
        ];
        let parent_id = items[0].id;
        let new_id = insert_sub_item(&mut items, parent_id).unwrap();

        assert_eq!(items[3].id, new_id);
        assert_eq!(items[4].description, "other");
    }

    #[test]
    fn sub_item_keeps_the_parent_kind() {
        let mut items = vec![category("cat", 0), work_item("item", 0)];
        let cat_id = items[0].id;
        let item_id = items[1].id;

        let sub_cat = insert_sub_item(&mut items, cat_id).unwrap();
        let sub_item = insert_sub_item(&mut items, item_id).unwrap();

        let find = |id| items.iter().find(|item| item.id == id).unwrap();
        assert_eq!(find(sub_cat).kind, ItemKind::Category);
        assert_eq!(find(sub_item).kind, ItemKind::WorkItem);
    }

    #[test]
    fn sub_item_under_unknown_parent_is_a_no_op() {
        let mut items = vec![category("A", 0)];
        assert_eq!(insert_sub_item(&mut items, Uuid::new_v4()), None);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn sub_item_at_sequence_end_appends() {
        let mut items = vec![category("A", 0)];
        let parent_id = items[0].id;
        insert_sub_item(&mut items, parent_id).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].indent, 1);
    }

    // ── Movement ────────────────────────────────────────────────────

    #[test]
    fn leaf_move_swaps_adjacent_rows() {
        let mut items = vec![
            category("A", 0),
            work_item("a1", 1),
            work_item("a2", 1),
        ];
        assert!(move_item(&mut items, 2, MoveDirection::Up));
        assert_eq!(descriptions(&items), ["A", "a2", "a1"]);

        assert!(move_item(&mut items, 1, MoveDirection::Down));
        assert_eq!(descriptions(&items), ["A", "a1", "a2"]);
    }

    #[test]
    fn category_move_carries_its_descendants() {
        let mut items = vec![
            category("A", 0),
            work_item("a1", 1),
            work_item("a2", 1),
            category("B", 0),
            work_item("b1", 1),
        ];
        assert!(move_item(&mut items, 3, MoveDirection::Up));
        assert_eq!(descriptions(&items), ["B", "b1", "A", "a1", "a2"]);

        assert!(move_item(&mut items, 0, MoveDirection::Down));
        assert_eq!(descriptions(&items), ["A", "a1", "a2", "B", "b1"]);
    }

    #[test]
    fn moves_stop_at_sequence_boundaries() {
        let mut items = vec![category("A", 0), category("B", 0)];
        assert!(!move_item(&mut items, 0, MoveDirection::Up));
        assert!(!move_item(&mut items, 1, MoveDirection::Down));
        assert_eq!(descriptions(&items), ["A", "B"]);
    }

    #[test]
    fn first_child_cannot_move_above_its_parent() {
        let mut items = vec![category("A", 0), work_item("a1", 1)];
        assert!(!move_item(&mut items, 1, MoveDirection::Up));
        assert_eq!(descriptions(&items), ["A", "a1"]);
    }

    #[test]
    fn orphan_rows_do_not_move() {
        let mut items = vec![category("A", 0), work_item("stray", 2)];
        assert!(!move_item(&mut items, 1, MoveDirection::Up));
        assert!(!move_item(&mut items, 1, MoveDirection::Down));
    }

    #[test]
    fn out_of_range_index_is_a_no_op() {
        let mut items = vec![category("A", 0)];
        assert!(!move_item(&mut items, 5, MoveDirection::Down));
    }

    // ── Soft delete and commit ──────────────────────────────────────

    #[test]
    fn toggling_twice_restores_the_row() {
        let mut items = vec![work_item("a", 0)];
        let id = items[0].id;

        assert_eq!(toggle_deleted(&mut items, id), Ok(true));
        assert!(items[0].deleted);
        assert_eq!(toggle_deleted(&mut items, id), Ok(false));
        assert!(!items[0].deleted);
    }

    #[test]
    fn strip_deleted_removes_rows_permanently() {
        let mut items = vec![work_item("keep", 0), work_item("drop", 0)];
        let drop_id = items[1].id;
        toggle_deleted(&mut items, drop_id).unwrap();

        assert_eq!(strip_deleted(&mut items), 1);
        assert_eq!(descriptions(&items), ["keep"]);
        assert_eq!(strip_deleted(&mut items), 0);
    }

    // ── Field edits ─────────────────────────────────────────────────

    #[test]
    fn manual_price_edit_records_provenance() {
        let mut items = vec![work_item("a", 0)];
        let id = items[0].id;

        apply_edit(&mut items, id, FieldEdit::UnitPrice(125_000.0)).unwrap();
        assert_eq!(items[0].unit_price, 125_000.0);
        assert_eq!(items[0].price_source, Some(PriceSource::Manual));
    }

    #[test]
    fn negative_price_is_rejected_without_mutation() {
        let mut items = vec![work_item("a", 0)];
        let id = items[0].id;
        items[0].unit_price = 10.0;

        assert_eq!(
            apply_edit(&mut items, id, FieldEdit::UnitPrice(-1.0)),
            Err(SheetError::NegativePrice)
        );
        assert_eq!(items[0].unit_price, 10.0);
        assert_eq!(items[0].price_source, None);
    }

    #[test]
    fn edits_on_unknown_ids_fail() {
        let mut items = vec![work_item("a", 0)];
        let missing = Uuid::new_v4();
        assert_eq!(
            apply_edit(&mut items, missing, FieldEdit::Note("x".into())),
            Err(SheetError::UnknownItem(missing))
        );
    }

    #[test]
    fn quantity_can_be_cleared() {
        let mut items = vec![work_item("a", 0)];
        let id = items[0].id;
        items[0].quantity = Some(4.0);

        apply_edit(&mut items, id, FieldEdit::Quantity(None)).unwrap();
        assert_eq!(items[0].quantity, None);
    }
}
