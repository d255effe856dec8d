// Display numbering for the cost sheet.
//
// Top-level categories carry upper-case Roman numerals (I, II, ...),
// counting categories only. Top-level work items outside any category
// carry a flat arabic counter (1, 2, ...), counting such items only.
// Nested rows extend their parent's number with a dot and a per-parent
// counter, where category children and work-item children are counted
// independently of each other. Rows whose parent cannot be located
// render the sentinel instead of failing.

use std::collections::HashMap;

use uuid::Uuid;

use crate::outline::Outline;
use crate::types::LineItem;

/// Rendered in place of a number when the hierarchy is malformed.
pub const ORPHAN_NUMBER: &str = "?.?";

const ROMAN_TABLE: &[(u32, &str)] = &[
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Upper-case Roman numeral in subtractive notation. Zero renders as
/// the empty string.
pub fn roman(mut n: u32) -> String {
    let mut out = String::new();
    for &(value, digits) in ROMAN_TABLE {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

/// Display numbers for every visible row, keyed by item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Numbering {
    numbers: HashMap<Uuid, String>,
    orphaned: Vec<Uuid>,
}

impl Numbering {
    /// Numbers the visible (non-deleted) rows of the sequence. Pure:
    /// the same sequence always yields the same numbers.
    pub fn compute(items: &[LineItem]) -> Self {
        let visible: Vec<&LineItem> = items.iter().filter(|item| !item.deleted).collect();
        let outline = Outline::from_indents(visible.iter().map(|item| item.indent).collect());

        let mut numbers: Vec<String> = Vec::with_capacity(visible.len());
        let mut orphaned = Vec::new();
        let mut roman_count = 0u32;
        let mut flat_count = 0u32;
        // Per-row child counters: (categories seen, work items seen).
        let mut child_counts: Vec<(u32, u32)> = vec![(0, 0); visible.len()];

        for (pos, item) in visible.iter().enumerate() {
            let display = match outline.parent(pos) {
                Some(parent_pos) => {
                    let counts = &mut child_counts[parent_pos];
                    let ordinal = if item.is_category() {
                        counts.0 += 1;
                        counts.0
                    } else {
                        counts.1 += 1;
                        counts.1
                    };
                    format!("{}.{}", numbers[parent_pos], ordinal)
                }
                None if item.indent == 0 => {
                    if item.is_category() {
                        roman_count += 1;
                        roman(roman_count)
                    } else {
                        flat_count += 1;
                        flat_count.to_string()
                    }
                }
                None => {
                    orphaned.push(item.id);
                    ORPHAN_NUMBER.to_string()
                }
            };
            numbers.push(display);
        }

        Numbering {
            numbers: visible
                .iter()
                .zip(numbers)
                .map(|(item, number)| (item.id, number))
                .collect(),
            orphaned,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&str> {
        self.numbers.get(&id).map(String::as_str)
    }

    /// Number for the row, or the empty string for unknown (deleted) ids.
    pub fn display(&self, id: Uuid) -> &str {
        self.get(id).unwrap_or("")
    }

    /// Ids of rows that rendered the sentinel because no enclosing row
    /// one level up exists.
    pub fn orphaned(&self) -> &[Uuid] {
        &self.orphaned
    }
}
