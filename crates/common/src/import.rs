// Spreadsheet import: header validation and row classification.
//
// The file reader (xlsx, csv) lives outside the engine; what arrives
// here is the extracted cell grid, header row first. The header must
// match one of the two expected column sets exactly or the import is
// rejected wholesale. Rows with no quantity and no price whose
// description carries no lower-case letters become categories, since
// RAB sheets conventionally write section headers in upper case.

use thiserror::Error;

use crate::types::{ItemKind, LineItem, PriceSource};

/// Column set for priced (RAB) sheets.
pub const HEADER_WITH_PRICE: [&str; 5] = ["description", "unit", "quantity", "unit_price", "note"];

/// Column set for quantity-only (BQ) sheets.
pub const HEADER_WITHOUT_PRICE: [&str; 4] = ["description", "unit", "quantity", "note"];

#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    #[error("import contains no rows")]
    Empty,

    #[error("unrecognized header row: {0:?}")]
    HeaderMismatch(Vec<String>),

    #[error("row {row}: expected {expected} columns, found {found}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: cannot parse number from {value:?}")]
    InvalidNumber { row: usize, value: String },
}

/// Converts an extracted cell grid into line items. Any error aborts
/// the whole import; no partial sheet is ever produced. Row numbers in
/// errors are 1-based over the data rows (the header is row 0).
///
/// Work items that follow at least one category are indented one level
/// under it; rows before the first category stay at top level.
pub fn import_rows(rows: &[Vec<String>]) -> Result<Vec<LineItem>, ImportError> {
    let (header, data) = rows.split_first().ok_or(ImportError::Empty)?;
    let with_price = match_header(header)?;
    let expected_columns = if with_price {
        HEADER_WITH_PRICE.len()
    } else {
        HEADER_WITHOUT_PRICE.len()
    };

    let mut items = Vec::new();
    let mut seen_category = false;

    for (offset, cells) in data.iter().enumerate() {
        let row = offset + 1;
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if cells.len() != expected_columns {
            return Err(ImportError::ColumnCount {
                row,
                expected: expected_columns,
                found: cells.len(),
            });
        }

        let description = cells[0].trim().to_string();
        let unit = cells[1].trim().to_string();
        let quantity = parse_optional_number(&cells[2], row)?;
        let unit_price = if with_price {
            parse_optional_number(&cells[3], row)?
        } else {
            None
        };
        let note = cells[expected_columns - 1].trim().to_string();

        if quantity.is_none() && unit_price.is_none() && is_header_case(&description) {
            let mut item = LineItem::new_category(description);
            item.note = note;
            items.push(item);
            seen_category = true;
        } else {
            let mut item = LineItem::new_work_item(description);
            item.indent = if seen_category { 1 } else { 0 };
            item.unit = unit;
            item.quantity = quantity;
            item.note = note;
            if let Some(price) = unit_price {
                item.unit_price = price;
                item.price_source = Some(PriceSource::Manual);
            }
            items.push(item);
        }
    }

    Ok(items)
}

fn match_header(header: &[String]) -> Result<bool, ImportError> {
    let normalized: Vec<String> = header
        .iter()
        .map(|cell| cell.trim().to_lowercase())
        .collect();
    if normalized == HEADER_WITH_PRICE {
        Ok(true)
    } else if normalized == HEADER_WITHOUT_PRICE {
        Ok(false)
    } else {
        Err(ImportError::HeaderMismatch(header.to_vec()))
    }
}

fn parse_optional_number(cell: &str, row: usize) -> Result<Option<f64>, ImportError> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ImportError::InvalidNumber {
            row,
            value: cell.to_string(),
        })
}

fn is_header_case(description: &str) -> bool {
    !description.is_empty() && !description.chars().any(|ch| ch.is_lowercase())
}
