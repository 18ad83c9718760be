use modelfilter_core::{Item, QueryError};
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid item collection: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        source: serde_json::Error,
    },
    #[error("document holds no item collection")]
    NoCollection,
}

impl LoadError {
    /// The collection file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<LoadError> for QueryError {
    fn from(e: LoadError) -> Self {
        QueryError::Load(e.to_string())
    }
}

/// Reads an item collection from disk. `.zst` files are decompressed first.
pub fn load_items(path: impl AsRef<Path>) -> Result<Vec<Item>, LoadError> {
    let path = path.as_ref();
    let io_err = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };
    let f = File::open(path).map_err(io_err)?;
    let mut buf = Vec::new();
    if path.extension().is_some_and(|e| e == "zst") {
        let mut d = zstd::Decoder::new(f).map_err(io_err)?;
        d.read_to_end(&mut buf).map_err(io_err)?;
    } else {
        let mut f = f;
        f.read_to_end(&mut buf).map_err(io_err)?;
    }
    let items = parse_items(&buf)?;
    debug!(path = %path.display(), items = items.len(), "items read");
    Ok(items)
}

/// Accepts a JSON array of items, an object carrying `collection` or
/// `data.collection`, a single item object, or one item per line.
pub fn parse_items(bytes: &[u8]) -> Result<Vec<Item>, LoadError> {
    match serde_json::from_slice::<JsonValue>(bytes) {
        Ok(doc) => from_document(doc),
        Err(_) => parse_lines(bytes),
    }
}

fn from_document(doc: JsonValue) -> Result<Vec<Item>, LoadError> {
    match doc {
        JsonValue::Array(_) => Ok(serde_json::from_value(doc)?),
        JsonValue::Object(mut map) => {
            if let Some(collection) = map.remove("collection") {
                return Ok(serde_json::from_value(collection)?);
            }
            if let Some(collection) = map
                .get_mut("data")
                .and_then(|d| d.get_mut("collection"))
                .map(JsonValue::take)
            {
                return Ok(serde_json::from_value(collection)?);
            }
            if ["externalId", "id", "dbId"].iter().any(|k| map.contains_key(*k)) {
                return Ok(vec![serde_json::from_value(JsonValue::Object(map))?]);
            }
            Err(LoadError::NoCollection)
        }
        _ => Err(LoadError::NoCollection),
    }
}

fn parse_lines(bytes: &[u8]) -> Result<Vec<Item>, LoadError> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(line).map_err(|source| LoadError::Line {
            line: idx + 1,
            source,
        })?;
        out.push(item);
    }
    Ok(out)
}
