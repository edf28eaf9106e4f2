//! Owned rows and parameter conversion.
//!
//! Statements take their parameters as `sea_query::Value`s and return
//! [`SqlRow`]s: owned, column-named rows whose cells are also `Value`s. This
//! keeps row mapping independent of the driver, so the same mapping code runs
//! against `may_postgres` rows and against the in-memory mock.

use crate::error::RepositoryError;
use may_postgres::types::{ToSql, Type};
use may_postgres::Row;
use rust_decimal::Decimal;
use sea_query::Value;

/// A single result row, addressed by column name
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    columns: Vec<(String, Value)>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<Value>) {
        self.columns.push((name.to_string(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw cell lookup by column name
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conversion` if the row has no such column.
    pub fn get(&self, name: &str) -> Result<&Value, RepositoryError> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
            .ok_or_else(|| RepositoryError::Conversion(format!("missing column '{name}'")))
    }

    /// Nullable integer cell. `INT2`/`INT4` widen, `INT8` must fit in `i32`.
    pub fn get_opt_i32(&self, name: &str) -> Result<Option<i32>, RepositoryError> {
        match self.get(name)? {
            Value::Int(v) => Ok(*v),
            Value::SmallInt(v) => Ok(v.map(i32::from)),
            Value::BigInt(Some(v)) => i32::try_from(*v).map(Some).map_err(|_| {
                RepositoryError::Conversion(format!("column '{name}' value {v} overflows i32"))
            }),
            Value::BigInt(None) => Ok(None),
            other => Err(type_mismatch(name, "integer", other)),
        }
    }

    pub fn get_i32(&self, name: &str) -> Result<i32, RepositoryError> {
        self.get_opt_i32(name)?.ok_or_else(|| null_value(name))
    }

    pub fn get_string(&self, name: &str) -> Result<String, RepositoryError> {
        match self.get(name)? {
            Value::String(Some(s)) => Ok(s.to_string()),
            Value::String(None) => Err(null_value(name)),
            other => Err(type_mismatch(name, "text", other)),
        }
    }

    pub fn get_decimal(&self, name: &str) -> Result<Decimal, RepositoryError> {
        match self.get(name)? {
            Value::Decimal(Some(d)) => Ok(Decimal::clone(d)),
            Value::Decimal(None) => Err(null_value(name)),
            Value::Int(Some(i)) => Ok(Decimal::from(*i)),
            Value::BigInt(Some(i)) => Ok(Decimal::from(*i)),
            other => Err(type_mismatch(name, "numeric", other)),
        }
    }
}

fn null_value(name: &str) -> RepositoryError {
    RepositoryError::Conversion(format!("column '{name}' is NULL"))
}

fn type_mismatch(name: &str, expected: &str, actual: &Value) -> RepositoryError {
    RepositoryError::Conversion(format!(
        "column '{name}': expected {expected}, got {actual:?}"
    ))
}

/// Build a `Value` for a `NUMERIC` parameter
pub fn decimal_value(decimal: Decimal) -> Value {
    Value::from(decimal)
}

/// Convert a `may_postgres` row into an owned [`SqlRow`].
///
/// Only the column types the inventory schema uses are supported: integers,
/// text and numeric.
pub fn from_pg_row(row: &Row) -> Result<SqlRow, RepositoryError> {
    let mut out = SqlRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = match *column.type_() {
            Type::INT2 => Value::SmallInt(row.try_get::<usize, Option<i16>>(idx)?),
            Type::INT4 => Value::Int(row.try_get::<usize, Option<i32>>(idx)?),
            Type::INT8 => Value::BigInt(row.try_get::<usize, Option<i64>>(idx)?),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                Value::String(row.try_get::<usize, Option<String>>(idx)?)
            }
            Type::NUMERIC => match row.try_get::<usize, Option<Decimal>>(idx)? {
                Some(d) => decimal_value(d),
                None => Value::Decimal(None),
            },
            ref other => {
                return Err(RepositoryError::Conversion(format!(
                    "unsupported column type {other} for column '{name}'"
                )))
            }
        };
        out.push(name, value);
    }
    Ok(out)
}

/// Convert `sea_query` values to may_postgres `ToSql` parameters and run `f`
/// with them.
///
/// NULLs keep their type (`Value::Int(None)` binds as a NULL `INT4`) so the
/// server accepts them for typed columns.
///
/// # Errors
///
/// Returns `RepositoryError::Conversion` for value kinds the inventory schema
/// never binds.
pub fn with_converted_params<F, R>(values: &[Value], f: F) -> Result<R, RepositoryError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, RepositoryError>,
{
    let owned = values
        .iter()
        .map(to_sql_param)
        .collect::<Result<Vec<_>, _>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| &**p).collect();
    f(&params)
}

fn to_sql_param(value: &Value) -> Result<Box<dyn ToSql>, RepositoryError> {
    let param: Box<dyn ToSql> = match value {
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::String(v) => Box::new(v.as_ref().map(|s| s.to_string())),
        Value::Decimal(v) => Box::new(v.as_ref().map(|d| Decimal::clone(d))),
        other => {
            return Err(RepositoryError::Conversion(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}
