use std::fs;
use std::path::Path;

use serde_json::Value;

use super::SourceItem;
use crate::error::{EvalError, Result};
use crate::jsonl::parse_jsonl_tolerant;

pub(super) fn read_documents(path: &Path) -> Result<Vec<SourceItem>> {
    let raw = fs::read_to_string(path).map_err(|err| {
        EvalError::SourceUnavailable(format!("cannot read log export {}: {err}", path.display()))
    })?;
    let parsed = parse_jsonl_tolerant::<Value>(&raw);

    let mut items = parsed.items.into_iter().map(Ok).collect::<Vec<SourceItem>>();
    if parsed.skipped_lines > 0 {
        let first = parsed
            .first_error
            .map(|(line_no, message)| format!("line {line_no}: {message}"))
            .unwrap_or_else(|| "undecodable line".to_string());
        items.push(Err(first));
        items.extend((1..parsed.skipped_lines).map(|_| Err("undecodable line".to_string())));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_lines_become_skipped_items() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.jsonl");
        fs::write(
            &path,
            "{\"operation_Id\":\"a\"}\n{truncated\n\n{\"operation_Id\":\"b\"}\nnull-ish\n",
        )
        .expect("write");
        let items = read_documents(&path).expect("read");
        assert_eq!(items.len(), 4);
        assert_eq!(items.iter().filter(|item| item.is_ok()).count(), 2);
        assert!(items[2].as_ref().is_err_and(|reason| reason.starts_with("line 2")));
    }

    #[test]
    fn missing_export_is_source_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_documents(&dir.path().join("absent.jsonl")).expect_err("missing");
        assert_eq!(err.code(), "SOURCE_UNAVAILABLE");
    }
}
