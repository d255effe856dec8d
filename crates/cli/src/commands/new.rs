// `anggar new` — create a RAB or BQ document through daemon RPC.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use anggar_common::protocol::methods;

use crate::client::DaemonClient;
use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindArg {
    /// Priced estimate (Rencana Anggaran Biaya).
    Rab,
    /// Quantity-only bill (Bill of Quantity).
    Bq,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Document title.
    pub title: String,

    /// Document kind.
    #[arg(long, value_enum, default_value = "rab")]
    kind: KindArg,

    /// Optional project code shown on exports.
    #[arg(long)]
    project_code: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResult {
    pub id: Uuid,
}

#[derive(Debug, Clone)]
struct NewRequest {
    kind: KindArg,
    title: String,
    project_code: Option<String>,
}

pub fn run(args: NewArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let request = NewRequest {
        kind: args.kind,
        title: args.title,
        project_code: args.project_code,
    };

    let rt = tokio::runtime::Handle::try_current()
        .map(|handle| handle.block_on(call_new(request.clone())))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("tokio runtime should build")
                .block_on(call_new(request))
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

async fn call_new(request: NewRequest) -> anyhow::Result<NewResult> {
    let client = daemon_launcher::connected_client().await?;
    create_document_with_client(&client, &request).await
}

async fn create_document_with_client(
    client: &DaemonClient,
    request: &NewRequest,
) -> anyhow::Result<NewResult> {
    let mut params = json!({
        "kind": request.kind,
        "title": request.title,
    });
    if let Some(code) = &request.project_code {
        params["project_code"] = json!(code);
    }

    client.call(methods::DOC_CREATE, params).await.context("doc.create request failed")
}

fn format_human(result: &NewResult) -> String {
    format!("Created document {}", result.id)
}
