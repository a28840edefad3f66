//! Snapshot files
//!
//! A collection exported as a JSON array of documents, each carrying its
//! `id` next to the stored fields.

use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::models::Document;

/// Read a collection from `file_path`
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not a JSON array of
/// objects with an `id`.
pub fn load_documents(file_path: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file_path)?);
    let documents: Vec<Document> = serde_json::from_reader(reader)?;
    debug!(path = %file_path.display(), documents = documents.len(), "Snapshot file loaded");
    Ok(documents)
}

/// Like [`load_documents`], but a missing file reads as an empty collection
pub fn load_documents_or_empty(file_path: &Path) -> Result<Vec<Document>> {
    if file_path.exists() {
        load_documents(file_path)
    } else {
        Ok(Vec::new())
    }
}

/// Write a collection to `file_path`, creating parent directories
pub fn save_documents(documents: &[Document], file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(file_path)?);
    serde_json::to_writer_pretty(&mut writer, documents)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!(path = %file_path.display(), documents = documents.len(), "Snapshot file written");
    Ok(())
}
