//! In-memory stand-in for the inventory database.
//!
//! [`MockDatabase`] keeps `units` and `items` tables in memory and answers
//! exactly the statements [`ItemRepository`](crate::ItemRepository) issues,
//! including the `get_all_items_by_name` function (exact name match, ordered
//! by id, soft-deleted rows included). Any other SQL is rejected.
//!
//! It also counts acquisitions and open connections so tests can check that
//! every operation released its connection, and it can inject a failure into
//! the next acquire or the next statement.

use crate::connection::ConnectionError;
use crate::error::RepositoryError;
use crate::executor::SqlExecutor;
use crate::pool::ConnectionProvider;
use crate::repository::queries;
use crate::value::{decimal_value, SqlRow};
use rust_decimal::Decimal;
use sea_query::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct ItemRecord {
    id: i32,
    vendor: String,
    name: String,
    unit_id: i32,
    weight: Decimal,
    amount: Option<i32>,
    reserve_rate: i32,
}

#[derive(Debug, Default)]
struct MockState {
    units: Vec<(i32, String)>,
    items: Vec<ItemRecord>,
    next_unit_id: i32,
    next_item_id: i32,
    open_connections: usize,
    acquisitions: usize,
    procedure_calls: usize,
    fail_next_acquire: bool,
    fail_next_statement: bool,
}

/// Shared handle to an in-memory database; clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connections acquired and not yet dropped
    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    /// Total successful `acquire` calls
    pub fn acquisitions(&self) -> usize {
        self.lock().acquisitions
    }

    /// How often `get_all_items_by_name` was invoked
    pub fn procedure_calls(&self) -> usize {
        self.lock().procedure_calls
    }

    /// Number of `units` rows carrying `label`
    pub fn unit_rows(&self, label: &str) -> usize {
        self.lock().units.iter().filter(|(_, unit)| unit == label).count()
    }

    pub fn fail_next_acquire(&self) {
        self.lock().fail_next_acquire = true;
    }

    pub fn fail_next_statement(&self) {
        self.lock().fail_next_statement = true;
    }
}

impl ConnectionProvider for MockDatabase {
    type Connection = MockConnection;

    fn acquire(&self) -> Result<Self::Connection, RepositoryError> {
        let mut state = self.lock();
        if std::mem::take(&mut state.fail_next_acquire) {
            return Err(ConnectionError::Unhealthy("injected acquire failure".to_string()).into());
        }
        state.open_connections += 1;
        state.acquisitions += 1;
        Ok(MockConnection {
            db: self.clone(),
        })
    }
}

/// A connection handed out by [`MockDatabase`]; released on drop.
#[derive(Debug)]
pub struct MockConnection {
    db: MockDatabase,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut state = self.db.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}

impl SqlExecutor for MockConnection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, RepositoryError> {
        let mut state = self.db.lock();
        state.check_injected_failure()?;
        match sql {
            queries::UPDATE_ITEM_QUANTITY_BY_ID => {
                let amount = param_i32(params, 0)?;
                let id = param_i32(params, 1)?;
                Ok(state.update_item(id, |item| item.amount = Some(amount)))
            }
            queries::UPDATE_ITEM => {
                let vendor = param_string(params, 0)?;
                let name = param_string(params, 1)?;
                let unit_id = param_i32(params, 2)?;
                let weight = param_decimal(params, 3)?;
                let reserve_rate = param_i32(params, 4)?;
                let id = param_i32(params, 5)?;
                state.check_unit_exists(unit_id)?;
                Ok(state.update_item(id, |item| {
                    item.vendor = vendor;
                    item.name = name;
                    item.unit_id = unit_id;
                    item.weight = weight;
                    item.reserve_rate = reserve_rate;
                }))
            }
            queries::SET_AMOUNT_NULL => {
                let id = param_i32(params, 0)?;
                Ok(state.update_item(id, |item| item.amount = None))
            }
            _ => Err(unsupported(sql)),
        }
    }

    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<SqlRow>, RepositoryError> {
        let mut state = self.db.lock();
        state.check_injected_failure()?;
        match sql {
            queries::GET_ALL_ITEMS => {
                state.joined_rows(|item| item.amount.is_some(), None)
            }
            queries::GET_ITEM_BY_VENDOR => {
                let vendor = param_string(params, 0)?;
                state.joined_rows(|item| item.vendor == vendor, Some(1))
            }
            queries::GET_ITEM_BY_ID => {
                let id = param_i32(params, 0)?;
                state.joined_rows(|item| item.id == id, None)
            }
            queries::GET_ALL_ITEMS_BY_NAME_AND_AMOUNT => {
                let pattern = param_string(params, 0)?;
                let min = param_i32(params, 1)?;
                let max = param_i32(params, 2)?;
                state.joined_rows(
                    |item| {
                        like_matches(&pattern, &item.name)
                            && item.amount.is_some_and(|a| a >= min && a <= max)
                    },
                    None,
                )
            }
            queries::GET_ALL_ITEMS_ID => Ok(state
                .sorted_items()
                .into_iter()
                .filter(|item| item.amount.is_some())
                .map(|item| SqlRow::new().with("id", item.id))
                .collect()),
            queries::GET_ALL_ITEMS_BY_NAME => {
                state.procedure_calls += 1;
                let name = param_string(params, 0)?;
                state.joined_rows(|item| item.name == name, None)
            }
            queries::INSERT_ITEM => {
                let unit_id = param_i32(params, 2)?;
                state.check_unit_exists(unit_id)?;
                state.next_item_id += 1;
                let record = ItemRecord {
                    id: state.next_item_id,
                    vendor: param_string(params, 0)?,
                    name: param_string(params, 1)?,
                    unit_id,
                    weight: param_decimal(params, 3)?,
                    amount: param_opt_i32(params, 4)?,
                    reserve_rate: param_i32(params, 5)?,
                };
                let id = record.id;
                state.items.push(record);
                Ok(vec![SqlRow::new().with("id", id)])
            }
            queries::GET_UNIT_ID_BY_VALUE => {
                let unit = param_string(params, 0)?;
                Ok(state
                    .units
                    .iter()
                    .filter(|(_, label)| *label == unit)
                    .map(|(id, _)| SqlRow::new().with("id", *id))
                    .collect())
            }
            queries::INSERT_UNIT => {
                let unit = param_string(params, 0)?;
                state.next_unit_id += 1;
                let id = state.next_unit_id;
                state.units.push((id, unit));
                Ok(vec![SqlRow::new().with("id", id)])
            }
            _ => Err(unsupported(sql)),
        }
    }
}

impl MockState {
    fn check_injected_failure(&mut self) -> Result<(), RepositoryError> {
        if std::mem::take(&mut self.fail_next_statement) {
            return Err(RepositoryError::Query("injected statement failure".to_string()));
        }
        Ok(())
    }

    fn check_unit_exists(&self, unit_id: i32) -> Result<(), RepositoryError> {
        if self.units.iter().any(|(id, _)| *id == unit_id) {
            Ok(())
        } else {
            Err(RepositoryError::Query(format!(
                "foreign key violation: unit {unit_id} does not exist"
            )))
        }
    }

    fn update_item(&mut self, id: i32, apply: impl FnOnce(&mut ItemRecord)) -> u64 {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                apply(item);
                1
            }
            None => 0,
        }
    }

    fn sorted_items(&self) -> Vec<&ItemRecord> {
        let mut items: Vec<&ItemRecord> = self.items.iter().collect();
        items.sort_by_key(|item| item.id);
        items
    }

    fn joined_rows(
        &self,
        filter: impl Fn(&ItemRecord) -> bool,
        limit: Option<usize>,
    ) -> Result<Vec<SqlRow>, RepositoryError> {
        self.sorted_items()
            .into_iter()
            .filter(|item| filter(*item))
            .take(limit.unwrap_or(usize::MAX))
            .map(|item| self.joined_row(item))
            .collect()
    }

    fn joined_row(&self, item: &ItemRecord) -> Result<SqlRow, RepositoryError> {
        let unit = self
            .units
            .iter()
            .find(|(id, _)| *id == item.unit_id)
            .map(|(_, label)| label.clone())
            .ok_or_else(|| RepositoryError::Query(format!("dangling unit_id {}", item.unit_id)))?;
        Ok(SqlRow::new()
            .with("id", item.id)
            .with("vendor", item.vendor.as_str())
            .with("name", item.name.as_str())
            .with("unit", unit)
            .with("weight", decimal_value(item.weight))
            .with("amount", Value::Int(item.amount))
            .with("reserve_rate", item.reserve_rate))
    }
}

fn unsupported(sql: &str) -> RepositoryError {
    RepositoryError::Query(format!("mock database does not understand: {sql}"))
}

fn param(params: &[Value], idx: usize) -> Result<SqlRow, RepositoryError> {
    let value = params.get(idx).cloned().ok_or_else(|| {
        RepositoryError::Query(format!("missing parameter ${}", idx + 1))
    })?;
    Ok(SqlRow::new().with("param", value))
}

fn param_i32(params: &[Value], idx: usize) -> Result<i32, RepositoryError> {
    param(params, idx)?.get_i32("param")
}

fn param_opt_i32(params: &[Value], idx: usize) -> Result<Option<i32>, RepositoryError> {
    param(params, idx)?.get_opt_i32("param")
}

fn param_string(params: &[Value], idx: usize) -> Result<String, RepositoryError> {
    param(params, idx)?.get_string("param")
}

fn param_decimal(params: &[Value], idx: usize) -> Result<Decimal, RepositoryError> {
    param(params, idx)?.get_decimal("param")
}

/// SQL `LIKE` with `%` and `_`, case-sensitive, no escape character
fn like_matches(pattern: &str, text: &str) -> bool {
    fn go(p: &[char], t: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|skip| go(rest, &t[skip..])),
            Some(('_', rest)) => !t.is_empty() && go(rest, &t[1..]),
            Some((c, rest)) => t.first() == Some(c) && go(rest, &t[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    go(&p, &t)
}
