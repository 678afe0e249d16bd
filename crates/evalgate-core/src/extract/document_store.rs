use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;

use super::SourceItem;
use crate::error::{EvalError, Result};

fn check_identifier(kind: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(EvalError::Validation(format!(
            "document store {kind} must be a plain identifier, got: {value}"
        )))
    }
}

fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(EvalError::SourceUnavailable(format!(
            "document store not found: {}",
            path.display()
        )));
    }
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| {
        EvalError::SourceUnavailable(format!(
            "cannot open document store {}: {err}",
            path.display()
        ))
    })
}

/// Reads every row's JSON document from `table.column` in rowid order.
pub(super) fn read_documents(path: &Path, table: &str, column: &str) -> Result<Vec<SourceItem>> {
    check_identifier("table", table)?;
    check_identifier("column", column)?;
    let conn = open_read_only(path)?;

    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()
        .map_err(|err| EvalError::SourceUnavailable(format!("cannot read schema: {err}")))?;
    if exists.is_none() {
        return Err(EvalError::SourceUnavailable(format!(
            "table {table} not found in {}",
            path.display()
        )));
    }

    let mut stmt = conn
        .prepare(&format!("SELECT rowid, \"{column}\" FROM \"{table}\" ORDER BY rowid"))
        .map_err(|err| EvalError::SourceUnavailable(format!("cannot query {table}: {err}")))?;
    let rows = stmt.query_map([], |row| {
        let rowid = row.get::<_, i64>(0)?;
        let item = match row.get_ref(1)? {
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => serde_json::from_str::<Value>(text)
                    .map_err(|err| format!("row {rowid}: {err}")),
                Err(err) => Err(format!("row {rowid}: {err}")),
            },
            ValueRef::Null => Err(format!("row {rowid}: document is null")),
            _ => Err(format!("row {rowid}: document column is not text")),
        };
        Ok(item)
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}
