use std::path::Path;

use serde_json::{Map, Value};

use super::SourceItem;
use crate::error::{EvalError, Result};

/// Each CSV row becomes a flat object keyed by header; empty cells are
/// treated as absent.
pub(super) fn read_documents(path: &Path) -> Result<Vec<SourceItem>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(|err| {
            EvalError::SourceUnavailable(format!("cannot open flat export {}: {err}", path.display()))
        })?;
    let headers = reader
        .headers()
        .map_err(|err| {
            EvalError::SourceUnavailable(format!("cannot read header of {}: {err}", path.display()))
        })?
        .clone();

    let mut items = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let item = match row {
            Ok(row) => {
                let mut document = Map::new();
                for (header, cell) in headers.iter().zip(row.iter()) {
                    if cell.trim().is_empty() {
                        continue;
                    }
                    document.insert(header.trim().to_string(), Value::String(cell.to_string()));
                }
                Ok(Value::Object(document))
            }
            Err(err) => Err(format!("row {}: {err}", index + 1)),
        };
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn rows_map_to_flat_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.csv");
        fs::write(
            &path,
            "id,query,response,category,language\n\
             t1,\"Why is my bill higher, again?\",Promo ended.,billing,en\n\
             t2,\u{645}\u{62A}\u{649} \u{627}\u{644}\u{641}\u{627}\u{62A}\u{648}\u{631}\u{629}\u{61F},\u{627}\u{644}\u{623}\u{648}\u{644},,ar\n\
             t3,too,few\n",
        )
        .expect("write");
        let items = read_documents(&path).expect("read");
        assert_eq!(items.len(), 3);
        let first = items[0].as_ref().expect("row 1");
        assert_eq!(first["query"], "Why is my bill higher, again?");
        let second = items[1].as_ref().expect("row 2");
        assert!(second.get("category").is_none());
        assert_eq!(second["language"], "ar");
        assert!(items[2].is_err());
    }

    #[test]
    fn missing_export_is_source_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_documents(&dir.path().join("absent.csv")).expect_err("missing");
        assert_eq!(err.code(), "SOURCE_UNAVAILABLE");
    }
}
