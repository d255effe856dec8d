// `anggar import <doc> <file>` — append rows from a CSV sheet.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Document id.
    pub doc: Uuid,

    /// CSV file with a `description,unit,quantity[,unit_price],note` header.
    pub file: PathBuf,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: usize,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ImportedCount {
    imported: usize,
}

pub fn run(args: ImportArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let rows = read_rows(&args.file)?;
    let file_label = args.file.display().to_string();

    let rt = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(call_import(args.doc, rows.clone(), file_label.clone())))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_import(args.doc, rows, file_label))
        });

    match rt {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open `{}`", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .with_context(|| format!("failed to read a CSV record from `{}`", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

async fn call_import(doc: Uuid, rows: Vec<Vec<String>>, file: String) -> anyhow::Result<ImportResult> {
    let client = daemon_launcher::connected_client().await?;
    let counted: ImportedCount = client
        .call(methods::IMPORT_ROWS, json!({ "id": doc, "rows": rows }))
        .await
        .context("import.rows request failed")?;
    Ok(ImportResult {
        imported: counted.imported,
        file,
    })
}

fn format_human(result: &ImportResult) -> String {
    format!(
        "Imported {} row(s) from {}. They are session-only until `anggar save`.",
        result.imported, result.file
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_rows_parses_quoted_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let file_path = dir.path().join("sheet.csv");
        std::fs::write(
            &file_path,
            "description,unit,quantity,unit_price,note\n\
             PEKERJAAN PERSIAPAN,,,,\n\
             \"Pembersihan lokasi, manual\",m2,100,15000,\n",
        )
        .unwrap();

        let rows = read_rows(&file_path).expect("csv should parse");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "description");
        assert_eq!(rows[2][0], "Pembersihan lokasi, manual");
        assert_eq!(rows[2][3], "15000");
    }

    #[test]
    fn read_rows_accepts_ragged_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let file_path = dir.path().join("ragged.csv");
        std::fs::write(&file_path, "description,unit,quantity,note\nPERSIAPAN,\n").unwrap();

        let rows = read_rows(&file_path).expect("ragged csv should parse");
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.csv");
        let error = read_rows(&missing).expect_err("missing file should fail");
        assert!(format!("{error:#}").contains("absent.csv"));
    }

    #[test]
    fn human_format_reports_count_and_file() {
        let result = ImportResult {
            imported: 12,
            file: "rab.csv".into(),
        };
        let output = format_human(&result);
        assert!(output.contains("Imported 12 row(s) from rab.csv"));
        assert!(output.contains("anggar save"));
    }

    #[test]
    fn json_format_roundtrips() {
        let result = ImportResult {
            imported: 12,
            file: "rab.csv".into(),
        };
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, format_human).unwrap();
        let parsed: ImportResult = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.imported, 12);
        assert_eq!(parsed.file, "rab.csv");
    }
}
