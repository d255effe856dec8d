// Subtotals and the grand total.
//
// A category's subtotal covers every work item that follows it in the
// sequence until the next category at the same or a shallower indent.
// Work items never close the range, whatever their indent, so a stray
// top-level work item after a category still lands in that category's
// subtotal. Nested categories contribute to every open ancestor. The
// grand total sums all visible work items regardless of grouping.

use std::collections::HashMap;

use uuid::Uuid;

use crate::types::LineItem;

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    subtotals: HashMap<Uuid, f64>,
    grand_total: f64,
}

impl Totals {
    /// Single forward pass over the visible rows with a stack of open
    /// categories. Equivalent to scanning forward from each category
    /// separately, without the rescans.
    pub fn compute(items: &[LineItem]) -> Self {
        let mut subtotals: HashMap<Uuid, f64> = HashMap::new();
        let mut grand_total = 0.0;
        // Open categories: (id, indent).
        let mut open: Vec<(Uuid, u32)> = Vec::new();

        for item in items.iter().filter(|item| !item.deleted) {
            if item.is_category() {
                while let Some(&(_, indent)) = open.last() {
                    if indent >= item.indent {
                        open.pop();
                    } else {
                        break;
                    }
                }
                subtotals.insert(item.id, 0.0);
                open.push((item.id, item.indent));
            } else {
                let amount = item.amount();
                grand_total += amount;
                for &(id, _) in &open {
                    if let Some(subtotal) = subtotals.get_mut(&id) {
                        *subtotal += amount;
                    }
                }
            }
        }

        Totals {
            subtotals,
            grand_total,
        }
    }

    /// Subtotal for a category id; `None` for work items, deleted rows,
    /// and unknown ids.
    pub fn subtotal(&self, id: Uuid) -> Option<f64> {
        self.subtotals.get(&id).copied()
    }

    pub fn grand_total(&self) -> f64 {
        self.grand_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineItem;

    fn category(description: &str, indent: u32) -> LineItem {
        let mut item = LineItem::new_category(description);
        item.indent = indent;
        item
    }

    fn work_item(indent: u32, quantity: f64, unit_price: f64) -> LineItem {
        let mut item = LineItem::new_work_item("pekerjaan");
        item.indent = indent;
        item.quantity = Some(quantity);
        item.unit_price = unit_price;
        item
    }

    #[test]
    fn sibling_categories_split_the_sheet() {
        let items = vec![
            category("A", 0),
            work_item(1, 10.0, 100.0),
            work_item(1, 5.0, 100.0),
            category("B", 0),
            work_item(1, 1.0, 50.0),
        ];
        let totals = Totals::compute(&items);

        assert_eq!(totals.subtotal(items[0].id), Some(1500.0));
        assert_eq!(totals.subtotal(items[3].id), Some(50.0));
        assert_eq!(totals.grand_total(), 1550.0);
    }

    #[test]
    fn nested_categories_contribute_to_every_open_ancestor() {
        let items = vec![
            category("A", 0),
            work_item(1, 1.0, 100.0),
            category("A.1", 1),
            work_item(2, 1.0, 40.0),
            category("B", 0),
            work_item(1, 1.0, 7.0),
        ];
        let totals = Totals::compute(&items);

        assert_eq!(totals.subtotal(items[2].id), Some(40.0));
        assert_eq!(totals.subtotal(items[0].id), Some(140.0));
        assert_eq!(totals.subtotal(items[4].id), Some(7.0));
        assert_eq!(totals.grand_total(), 147.0);
    }

    #[test]
    fn work_items_never_close_a_category_range() {
        // The indent-0 work item after A's children still counts into A.
        let items = vec![
            category("A", 0),
            work_item(1, 1.0, 100.0),
            work_item(0, 1.0, 999.0),
            category("B", 0),
            work_item(1, 1.0, 1.0),
        ];
        let totals = Totals::compute(&items);

        assert_eq!(totals.subtotal(items[0].id), Some(1099.0));
        assert_eq!(totals.subtotal(items[3].id), Some(1.0));
        assert_eq!(totals.grand_total(), 1100.0);
    }

    #[test]
    fn deleted_rows_are_excluded_everywhere() {
        let mut gone = work_item(1, 100.0, 100.0);
        gone.deleted = true;
        let items = vec![category("A", 0), work_item(1, 2.0, 10.0), gone];
        let totals = Totals::compute(&items);

        assert_eq!(totals.subtotal(items[0].id), Some(20.0));
        assert_eq!(totals.grand_total(), 20.0);
    }

    #[test]
    fn deleted_categories_do_not_open_a_range() {
        let mut gone = category("GONE", 0);
        gone.deleted = true;
        let items = vec![gone.clone(), category("A", 0), work_item(1, 1.0, 5.0)];
        let totals = Totals::compute(&items);

        assert_eq!(totals.subtotal(gone.id), None);
        assert_eq!(totals.subtotal(items[1].id), Some(5.0));
    }

    #[test]
    fn empty_and_itemless_sheets_total_zero() {
        let totals = Totals::compute(&[]);
        assert_eq!(totals.grand_total(), 0.0);

        let items = vec![category("A", 0)];
        let totals = Totals::compute(&items);
        assert_eq!(totals.subtotal(items[0].id), Some(0.0));
        assert_eq!(totals.grand_total(), 0.0);
    }

    #[test]
    fn unentered_quantities_count_as_zero() {
        let mut pending = LineItem::new_work_item("belum diisi");
        pending.indent = 1;
        pending.unit_price = 1_000_000.0;
        let items = vec![category("A", 0), pending, work_item(1, 3.0, 10.0)];
        let totals = Totals::compute(&items);

        assert_eq!(totals.subtotal(items[0].id), Some(30.0));
        assert_eq!(totals.grand_total(), 30.0);
    }
}
