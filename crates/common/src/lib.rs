// anggar-common: shared types and pure sheet logic for the anggar workspace

pub mod document;
pub mod export;
pub mod formula;
pub mod import;
pub mod numbering;
pub mod outline;
pub mod protocol;
pub mod sheet;
pub mod totals;
pub mod types;
