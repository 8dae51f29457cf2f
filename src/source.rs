// Where raw student documents come from.

use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A point-in-time snapshot of the student collection.
pub trait DocumentSource {
    fn fetch_documents(&self) -> anyhow::Result<Vec<Value>>;
}

/// Reads a collection export from disk. The file holds either a JSON array
/// of documents or an object keyed by document id.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DocumentSource for JsonFileSource {
    fn fetch_documents(&self) -> anyhow::Result<Vec<Value>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))?;
        match value {
            Value::Array(docs) => Ok(docs),
            Value::Object(map) => Ok(map.into_iter().map(|(_, doc)| doc).collect()),
            other => anyhow::bail!(
                "{} must hold an array or an object of documents, found {}",
                self.path.display(),
                json_kind(&other)
            ),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub struct MemorySource {
    docs: Vec<Value>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(docs: Vec<Value>) -> Self {
        Self { docs }
    }
}

#[cfg(test)]
impl DocumentSource for MemorySource {
    fn fetch_documents(&self) -> anyhow::Result<Vec<Value>> {
        Ok(self.docs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_array_export() {
        let file = write_temp(r#"[{"Name": "A"}, {"Name": "B"}]"#);
        let docs = JsonFileSource::new(file.path()).fetch_documents().unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn reads_keyed_export_in_file_order() {
        let file = write_temp(r#"{"u2": {"Name": "B"}, "u1": {"Name": "A"}}"#);
        let docs = JsonFileSource::new(file.path()).fetch_documents().unwrap();
        assert_eq!(docs, vec![json!({"Name": "B"}), json!({"Name": "A"})]);
    }

    #[test]
    fn rejects_scalar_export() {
        let file = write_temp("42");
        let err = JsonFileSource::new(file.path())
            .fetch_documents()
            .unwrap_err();
        assert!(err.to_string().contains("found a number"));
    }
}
