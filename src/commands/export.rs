use anyhow::{Context, Result};
use std::path::PathBuf;

use kb_exporter::config::Config;
use kb_exporter::exporter::Exporter;

/// Arguments of one export run
#[derive(Debug, Clone)]
pub struct ExportParams {
    pub url: String,
    pub service: String,
    pub output: Option<PathBuf>,
    pub language: Option<String>,
    pub pretty: bool,
}

/// Crawl the knowledge base and write the document to the output path, or
/// pretty-printed to stdout
pub async fn export(config: Config, params: ExportParams) -> Result<()> {
    let exporter = Exporter::new(config);

    let export = exporter
        .export(&params.service, &params.url, params.language.as_deref())
        .await
        .with_context(|| format!("Failed to export {} with {}", params.url, params.service))?;

    match &params.output {
        Some(path) => export
            .write_to(path, params.pretty)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!(
            "{}",
            export.to_json(true).context("Failed to serialize the export")?
        ),
    }

    Ok(())
}
