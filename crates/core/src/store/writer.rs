//! Artifact writer.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::fs;
use tracing::debug;

use super::StoreError;
use crate::record::{ArtifactPath, NormalizedRecord, RawRow};

/// Writes artifacts below a store root.
///
/// Every artifact path is unique per task, so concurrent writers never
/// target the same file.
#[derive(Debug, Clone)]
pub struct ContentWriter {
    root: PathBuf,
}

impl ContentWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an artifact.
    pub fn path_for(&self, artifact: &ArtifactPath) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    pub async fn exists(&self, artifact: &ArtifactPath) -> bool {
        fs::metadata(self.path_for(artifact)).await.is_ok()
    }

    /// Persist a successful result payload as indented JSON.
    pub async fn write_result<T: Serialize + ?Sized>(
        &self,
        artifact: &ArtifactPath,
        payload: &T,
    ) -> Result<PathBuf, StoreError> {
        let bytes = to_indented_json(payload)?;
        self.write_bytes(artifact, &bytes).await
    }

    /// Persist a metadata-only stub for a record that was not fetched.
    pub async fn write_stub(
        &self,
        artifact: &ArtifactPath,
        record: &NormalizedRecord,
        row: &RawRow,
    ) -> Result<PathBuf, StoreError> {
        let stub = format_stub(record, row)?;
        self.write_bytes(artifact, stub.as_bytes()).await
    }

    async fn write_bytes(&self, artifact: &ArtifactPath, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let destination = self.path_for(artifact);
        let dir = self.root.join(artifact.dir());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::DirectoryCreationFailed {
                path: dir.clone(),
                source: e,
            })?;

        // Write next to the destination, then rename into place.
        let partial = dir.join(format!(".{}.part", artifact.file_name()));
        fs::write(&partial, bytes)
            .await
            .map_err(|e| StoreError::WriteFailed {
                path: partial.clone(),
                source: e,
            })?;
        fs::rename(&partial, &destination)
            .await
            .map_err(|e| StoreError::WriteFailed {
                path: destination.clone(),
                source: e,
            })?;

        debug!(path = %destination.display(), bytes = bytes.len(), "Artifact written");
        Ok(destination)
    }
}

/// Stub body: a header line, a marker line, then the raw row as JSON.
pub fn format_stub(record: &NormalizedRecord, row: &RawRow) -> Result<String, StoreError> {
    let json = String::from_utf8(to_indented_json(row)?).unwrap_or_default();
    Ok(format!(
        "# Type: {} | Rank: {} | RG: {}\n### Raw Row Data:\n{}",
        record.record_type, record.rank_absolute, record.rank_group, json
    ))
}

/// Marker line preceding the raw row in a stub artifact.
pub const STUB_ROW_MARKER: &str = "### Raw Row Data:";

/// JSON with four-space indentation.
pub fn to_indented_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row() -> RawRow {
        [
            ("type", "Organic"),
            ("url", ""),
            ("suburb", "Bondi Beach"),
            ("rank_absolute", "3"),
            ("rank_group", "2"),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_write_result_creates_directories() {
        let dir = TempDir::new().unwrap();
        let writer = ContentWriter::new(dir.path());
        let artifact = ArtifactPath::parse_tag("Bondi-Beach/organic/type-organic_rg2_ra3_example.md")
            .unwrap();

        let path = writer
            .write_result(&artifact, &json!({"id": "t1", "result": [{"crawl_progress": "finished"}]}))
            .await
            .unwrap();

        assert_eq!(
            path,
            dir.path().join("Bondi-Beach/organic/type-organic_rg2_ra3_example.md")
        );
        assert!(writer.exists(&artifact).await);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("    \"id\": \"t1\""));
        assert!(!dir
            .path()
            .join("Bondi-Beach/organic/.type-organic_rg2_ra3_example.md.part")
            .exists());
    }

    #[tokio::test]
    async fn test_write_stub_contains_raw_row() {
        let dir = TempDir::new().unwrap();
        let writer = ContentWriter::new(dir.path());
        let raw = row();
        let record = NormalizedRecord::from_row(&raw);
        let artifact = ArtifactPath::for_record(&record);

        let path = writer.write_stub(&artifact, &record, &raw).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("# Type: organic | Rank: 3 | RG: 2"));
        assert_eq!(lines.next(), Some(STUB_ROW_MARKER));

        let body = content.split_once(STUB_ROW_MARKER).unwrap().1;
        let parsed: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
        assert_eq!(parsed["suburb"], "Bondi Beach");
        assert_eq!(parsed["type"], "Organic");
    }

    #[test]
    fn test_indented_json_uses_four_spaces() {
        let bytes = to_indented_json(&json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n    \"a\": 1\n}");
    }
}
