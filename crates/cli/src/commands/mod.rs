// CLI subcommand dispatch.

use clap::Subcommand;

pub mod add;
pub mod catalog;
pub mod edit;
pub mod export;
pub mod history;
pub mod import;
pub mod lock;
pub mod ls;
pub mod move_item;
pub mod new;
pub mod price;
pub mod revise;
pub mod rm;
pub mod save;
pub mod show;

#[derive(Subcommand)]
pub enum Command {
    /// Create a document
    New(new::NewArgs),
    /// List documents
    Ls(ls::LsArgs),
    /// Show a document sheet with numbering and totals
    Show(show::ShowArgs),
    /// Add a category, work item, or sub-item row
    Add(add::AddArgs),
    /// Edit fields of a row
    Edit(edit::EditArgs),
    /// Move a row up or down within its block
    Move(move_item::MoveArgs),
    /// Toggle a row's deleted flag
    Rm(rm::RmArgs),
    /// Resolve prices from the catalogs or AHS breakdowns
    Price(price::PriceArgs),
    /// Search the price/work catalogs, or add an entry
    Catalog(catalog::CatalogArgs),
    /// Lock a document as final
    Lock(lock::LockArgs),
    /// Snapshot the locked sheet and reopen it for editing
    Revise(revise::ReviseArgs),
    /// List revisions; optionally switch the viewed revision
    History(history::HistoryArgs),
    /// Persist the document, dropping soft-deleted rows
    Save(save::SaveArgs),
    /// Import rows from a CSV file
    Import(import::ImportArgs),
    /// Export printable rows, optionally to a CSV file
    Export(export::ExportArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::New(args) => new::run(args),
        Command::Ls(args) => ls::run(args),
        Command::Show(args) => show::run(args),
        Command::Add(args) => add::run(args),
        Command::Edit(args) => edit::run(args),
        Command::Move(args) => move_item::run(args),
        Command::Rm(args) => rm::run(args),
        Command::Price(args) => price::run(args),
        Command::Catalog(args) => catalog::run(args),
        Command::Lock(args) => lock::run(args),
        Command::Revise(args) => revise::run(args),
        Command::History(args) => history::run(args),
        Command::Save(args) => save::run(args),
        Command::Import(args) => import::run(args),
        Command::Export(args) => export::run(args),
    }
}
