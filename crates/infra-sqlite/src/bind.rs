// Named-parameter translation and value codecs
//
// Core components speak named placeholders (`:name`); sqlx's SQLite
// driver binds positionally. The translator rewrites the statement to `?`
// placeholders and produces the bind list in encounter order, so a
// parameter referenced twice binds twice.

use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use strata_core::domain::{Params, Record, Value};
use strata_core::error::{DatabaseError, RepoError, Result};

/// Rewrites `:name` placeholders to `?` and resolves the bind order.
///
/// Placeholders inside single-quoted strings and double-quoted identifiers
/// are left alone, as is the `::` cast operator.
pub fn expand_named(sql: &str, params: &Params) -> Result<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut binds = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                out.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                out.push(c);
            }
            ':' if !in_single && !in_double => {
                if matches!(chars.peek(), Some(&(_, ':'))) {
                    // cast operator
                    chars.next();
                    out.push_str("::");
                    continue;
                }
                let start = i + 1;
                let mut end = start;
                while let Some((j, n)) = chars.peek().copied() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end == start {
                    out.push(':');
                    continue;
                }
                let name = &sql[start..end];
                let value = params
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| {
                        RepoError::Database(DatabaseError::permanent(format!(
                            "unknown bind parameter :{name}"
                        )))
                    })?;
                binds.push(value);
                out.push('?');
            }
            _ => out.push(c),
        }
    }

    Ok((out, binds))
}

/// Binds one value onto a sqlx query. Dates and datetimes are stored as
/// text in the fixed formats the core value parsers read back.
pub fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Integer(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Boolean(v) => query.bind(i64::from(*v)),
        Value::Date(v) => query.bind(v.format("%Y-%m-%d").to_string()),
        Value::DateTime(v) => query.bind(v.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::Blob(v) => query.bind(v.clone()),
        Value::Json(v) => query.bind(v.to_string()),
    }
}

/// Decodes one row into an ordered record, column order preserved.
///
/// Decode type comes from each value's storage class, not the declared
/// column type: expression columns (COUNT, SUM) carry no decltype.
pub fn decode_row(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index).map_err(decode_error)?;
        let storage_class = if raw.is_null() {
            "NULL".to_string()
        } else {
            raw.type_info().name().to_uppercase()
        };
        let value = match storage_class.as_str() {
            "NULL" => Value::Null,
            "INTEGER" | "BOOLEAN" => row
                .try_get::<i64, _>(index)
                .map(Value::Integer)
                .map_err(decode_error)?,
            "REAL" => row
                .try_get::<f64, _>(index)
                .map(Value::Float)
                .map_err(decode_error)?,
            "BLOB" => row
                .try_get::<Vec<u8>, _>(index)
                .map(Value::Blob)
                .map_err(decode_error)?,
            // TEXT and anything else come back as text; core value
            // accessors re-parse date/datetime strings on demand
            _ => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .map_err(decode_error)?,
        };
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn decode_error(err: sqlx::Error) -> RepoError {
    RepoError::Database(DatabaseError::permanent(format!("row decode failed: {err}")))
}

/// True when the statement produces a row set.
pub fn statement_returns_rows(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .map(str::to_uppercase)
        .unwrap_or_default();
    matches!(head.as_str(), "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN")
        || sql.to_uppercase().contains(" RETURNING ")
}
