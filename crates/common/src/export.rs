// Export row derivation.
//
// Produces the ordered, numbered row list a spreadsheet or PDF writer
// renders verbatim: item rows in sheet order, a subtotal row after
// each category's block, and a closing grand-total row. The writers
// themselves live outside the engine. BQ documents omit every price
// column and the total rows; quantities are the deliverable there.

use serde::{Deserialize, Serialize};

use crate::numbering::Numbering;
use crate::outline::Outline;
use crate::totals::Totals;
use crate::types::{DocumentKind, LineItem};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportRowKind {
    Category,
    WorkItem,
    Subtotal,
    GrandTotal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRow {
    pub kind: ExportRowKind,
    pub number: String,
    pub description: String,
    pub unit: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub amount: Option<f64>,
    pub note: String,
}

/// Derives the printable rows for the visible sheet.
pub fn export_rows(items: &[LineItem], kind: DocumentKind) -> Vec<ExportRow> {
    let visible: Vec<&LineItem> = items.iter().filter(|item| !item.deleted).collect();
    let numbering = Numbering::compute(items);
    let totals = Totals::compute(items);
    let outline = Outline::from_indents(visible.iter().map(|item| item.indent).collect());
    let with_prices = kind.shows_prices();

    let mut rows = Vec::with_capacity(visible.len() + 2);
    // Categories whose subtotal row is still owed: (position, block end).
    let mut pending: Vec<(usize, usize)> = Vec::new();

    for (pos, item) in visible.iter().enumerate() {
        if item.is_category() {
            rows.push(ExportRow {
                kind: ExportRowKind::Category,
                number: numbering.display(item.id).to_string(),
                description: item.description.clone(),
                unit: String::new(),
                quantity: None,
                unit_price: None,
                amount: None,
                note: item.note.clone(),
            });
            if with_prices {
                pending.push((pos, outline.block_end(pos)));
            }
        } else {
            rows.push(ExportRow {
                kind: ExportRowKind::WorkItem,
                number: numbering.display(item.id).to_string(),
                description: item.description.clone(),
                unit: item.unit.clone(),
                quantity: item.quantity,
                unit_price: with_prices.then_some(item.unit_price),
                amount: with_prices.then(|| item.amount()),
                note: item.note.clone(),
            });
        }

        // Close every block that ends here, innermost first.
        while let Some(&(category_pos, block_end)) = pending.last() {
            if block_end == pos + 1 {
                pending.pop();
                let category = visible[category_pos];
                rows.push(ExportRow {
                    kind: ExportRowKind::Subtotal,
                    number: String::new(),
                    description: format!("JUMLAH {}", numbering.display(category.id)),
                    unit: String::new(),
                    quantity: None,
                    unit_price: None,
                    amount: totals.subtotal(category.id),
                    note: String::new(),
                });
            } else {
                break;
            }
        }
    }

    if with_prices && !visible.is_empty() {
        rows.push(ExportRow {
            kind: ExportRowKind::GrandTotal,
            number: String::new(),
            description: "JUMLAH TOTAL".to_string(),
            unit: String::new(),
            quantity: None,
            unit_price: None,
            amount: Some(totals.grand_total()),
            note: String::new(),
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(description: &str, indent: u32) -> LineItem {
        let mut item = LineItem::new_category(description);
        item.indent = indent;
        item
    }

    fn work_item(description: &str, indent: u32, quantity: f64, price: f64) -> LineItem {
        let mut item = LineItem::new_work_item(description);
        item.indent = indent;
        item.quantity = Some(quantity);
        item.unit_price = price;
        item.unit = "m3".to_string();
        item
    }

    fn sample_sheet() -> Vec<LineItem> {
        vec![
            category("PEKERJAAN TANAH", 0),
            work_item("Galian", 1, 10.0, 100.0),
            work_item("Urugan", 1, 5.0, 100.0),
            category("PEKERJAAN BETON", 0),
            work_item("Sloof", 1, 1.0, 50.0),
        ]
    }

    #[test]
    fn rab_export_interleaves_subtotals_and_closes_with_the_grand_total() {
        let rows = export_rows(&sample_sheet(), DocumentKind::Rab);

        let kinds: Vec<ExportRowKind> = rows.iter().map(|row| row.kind).collect();
        assert_eq!(
            kinds,
            [
                ExportRowKind::Category,
                ExportRowKind::WorkItem,
                ExportRowKind::WorkItem,
                ExportRowKind::Subtotal,
                ExportRowKind::Category,
                ExportRowKind::WorkItem,
                ExportRowKind::Subtotal,
                ExportRowKind::GrandTotal,
            ]
        );

        assert_eq!(rows[0].number, "I");
        assert_eq!(rows[1].number, "I.1");
        assert_eq!(rows[3].description, "JUMLAH I");
        assert_eq!(rows[3].amount, Some(1500.0));
        assert_eq!(rows[6].description, "JUMLAH II");
        assert_eq!(rows[6].amount, Some(50.0));
        assert_eq!(rows[7].amount, Some(1550.0));
    }

    #[test]
    fn nested_category_subtotals_close_innermost_first() {
        let items = vec![
            category("A", 0),
            category("A SUB", 1),
            work_item("x", 2, 2.0, 10.0),
        ];
        let rows = export_rows(&items, DocumentKind::Rab);

        assert_eq!(rows[3].description, "JUMLAH I.1");
        assert_eq!(rows[3].amount, Some(20.0));
        assert_eq!(rows[4].description, "JUMLAH I");
        assert_eq!(rows[4].amount, Some(20.0));
    }

    #[test]
    fn bq_export_hides_prices_and_total_rows() {
        let rows = export_rows(&sample_sheet(), DocumentKind::Bq);

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.unit_price.is_none()));
        assert!(rows.iter().all(|row| row.amount.is_none()));
        assert_eq!(rows[1].quantity, Some(10.0));
        assert_eq!(rows[1].number, "I.1");
    }

    #[test]
    fn deleted_rows_never_reach_the_export() {
        let mut items = sample_sheet();
        items[2].deleted = true;
        let rows = export_rows(&items, DocumentKind::Rab);

        assert!(rows.iter().all(|row| row.description != "Urugan"));
        // Subtotal follows the remaining child.
        assert_eq!(rows[2].description, "JUMLAH I");
        assert_eq!(rows[2].amount, Some(1000.0));
    }

    #[test]
    fn childless_categories_still_emit_a_subtotal_row() {
        let items = vec![category("KOSONG", 0)];
        let rows = export_rows(&items, DocumentKind::Rab);

        assert_eq!(rows[1].kind, ExportRowKind::Subtotal);
        assert_eq!(rows[1].amount, Some(0.0));
        assert_eq!(rows[2].kind, ExportRowKind::GrandTotal);
    }

    #[test]
    fn empty_sheets_export_nothing() {
        assert!(export_rows(&[], DocumentKind::Rab).is_empty());
    }
}
