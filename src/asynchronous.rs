//! Async entry points (`async` feature). Rendering runs on the caller's
//! task; conversion and cell population run on tokio's blocking pool, and
//! files are written with `tokio::fs`.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::generator::{ConversionContext, TemplateGenerator};
use crate::options::DocumentMetadata;
use crate::tabular::workbook::validate_sheet_name;
use crate::tabular::{Record, TabularGenerator};

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Conversion(format!("worker task failed: {e}")))?
}

/// Async counterpart of [`write_output`](crate::generator::write_output).
pub async fn write_output_async(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, bytes).await?;
    log::info!("Wrote '{}' ({} bytes)", path.display(), bytes.len());
    Ok(())
}

impl TemplateGenerator {
    pub async fn generate_async<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
    ) -> Result<Vec<u8>> {
        self.convert_async(template, model, None, false).await
    }

    pub async fn generate_with_metadata_async<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        metadata: Option<&DocumentMetadata>,
    ) -> Result<Vec<u8>> {
        self.convert_async(template, model, metadata.cloned(), true)
            .await
    }

    pub async fn save_async<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate_async(template, model).await?;
        write_output_async(output_path.as_ref(), &bytes).await
    }

    pub async fn save_with_metadata_async<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        metadata: Option<&DocumentMetadata>,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self
            .generate_with_metadata_async(template, model, metadata)
            .await?;
        write_output_async(output_path.as_ref(), &bytes).await
    }

    async fn convert_async<M: Serialize + ?Sized>(
        &self,
        template: &str,
        model: &M,
        metadata: Option<DocumentMetadata>,
        advanced: bool,
    ) -> Result<Vec<u8>> {
        let markup = self.render(template, model)?;
        let converter = self.converter();
        let options = self.options().clone();
        blocking(move || {
            let ctx = ConversionContext {
                options: &options,
                metadata: metadata.as_ref(),
                advanced,
            };
            converter.convert(&markup, &ctx)
        })
        .await
    }
}

impl TabularGenerator {
    pub async fn generate_table_async<T: Serialize>(
        &self,
        data: &[T],
        sheet_name: &str,
    ) -> Result<Vec<u8>> {
        validate_sheet_name(sheet_name)?;
        let rows = data
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        let generator = self.clone();
        let sheet_name = sheet_name.to_string();
        blocking(move || generator.generate_table(&rows, &sheet_name)).await
    }

    pub async fn generate_from_dynamic_async(
        &self,
        data: &[Record],
        sheet_name: &str,
    ) -> Result<Vec<u8>> {
        validate_sheet_name(sheet_name)?;
        let records = data.to_vec();
        let generator = self.clone();
        let sheet_name = sheet_name.to_string();
        blocking(move || generator.generate_from_dynamic(&records, &sheet_name)).await
    }

    pub async fn save_table_async<T: Serialize>(
        &self,
        data: &[T],
        sheet_name: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate_table_async(data, sheet_name).await?;
        write_output_async(output_path.as_ref(), &bytes).await
    }

    pub async fn save_from_dynamic_async(
        &self,
        data: &[Record],
        sheet_name: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.generate_from_dynamic_async(data, sheet_name).await?;
        write_output_async(output_path.as_ref(), &bytes).await
    }
}
