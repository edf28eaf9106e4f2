//! Item repository over the `items` and `units` tables.
//!
//! Every public operation acquires exactly one connection from the
//! [`ConnectionProvider`], runs its statements on it and releases it by
//! dropping it on return, whether that return is a value, `false`, `None` or an
//! error. Nothing is cached between calls and no transaction spans two calls.
//!
//! # Unit resolution
//!
//! `create` and `update` store the unit label through a read-then-insert on
//! `units`. The two statements are not wrapped in a transaction and `units`
//! carries no unique constraint, so two callers introducing the same new
//! label at the same moment can both insert it. Serialized callers never
//! duplicate a label. This race is accepted.

use crate::error::RepositoryError;
use crate::executor::SqlExecutor;
use crate::item::Item;
use crate::pool::ConnectionProvider;
use crate::value::decimal_value;
use sea_query::Value;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// SQL statements issued by [`ItemRepository`].
pub(crate) mod queries {
    pub const GET_ALL_ITEMS: &str = "SELECT items.id, vendor, name, unit, weight, amount, reserve_rate \
         FROM items JOIN units ON items.unit_id = units.id \
         WHERE amount IS NOT NULL ORDER BY items.id";
    pub const GET_ITEM_BY_VENDOR: &str = "SELECT items.id, vendor, name, unit, weight, amount, reserve_rate \
         FROM items JOIN units ON items.unit_id = units.id \
         WHERE vendor = $1 ORDER BY items.id LIMIT 1";
    pub const GET_ITEM_BY_ID: &str = "SELECT items.id, vendor, name, unit, weight, amount, reserve_rate \
         FROM items JOIN units ON items.unit_id = units.id \
         WHERE items.id = $1";
    pub const GET_ALL_ITEMS_BY_NAME_AND_AMOUNT: &str = "SELECT items.id, vendor, name, unit, weight, amount, reserve_rate \
         FROM items JOIN units ON items.unit_id = units.id \
         WHERE name LIKE $1 AND amount >= $2 AND amount <= $3 ORDER BY items.id";
    pub const GET_ALL_ITEMS_ID: &str = "SELECT id FROM items WHERE amount IS NOT NULL ORDER BY id";

    pub const INSERT_ITEM: &str = "INSERT INTO items (vendor, name, unit_id, weight, amount, reserve_rate) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id";
    pub const UPDATE_ITEM_QUANTITY_BY_ID: &str = "UPDATE items SET amount = $1 WHERE id = $2";
    pub const UPDATE_ITEM: &str = "UPDATE items SET vendor = $1, name = $2, unit_id = $3, weight = $4, reserve_rate = $5 \
         WHERE id = $6";
    pub const SET_AMOUNT_NULL: &str = "UPDATE items SET amount = NULL WHERE id = $1";

    pub const GET_UNIT_ID_BY_VALUE: &str = "SELECT id FROM units WHERE unit = $1";
    pub const INSERT_UNIT: &str = "INSERT INTO units (unit) VALUES ($1) RETURNING id";

    /// Server-side set-returning function: exact name match, joined columns
    pub const GET_ALL_ITEMS_BY_NAME: &str = "SELECT * FROM get_all_items_by_name($1)";
}

/// Data access for inventory items
///
/// # Examples
///
/// ```no_run
/// use stockroom::{DatabaseConfig, Item, ItemRepository, PgConnectionProvider};
/// use rust_decimal::Decimal;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = PgConnectionProvider::from_config(&DatabaseConfig::load()?)?;
/// let repository = ItemRepository::new(provider);
///
/// let bolt = Item::builder()
///     .vendor("ACME-001")
///     .name("Bolt M6")
///     .unit("box")
///     .weight(Decimal::new(25, 1))
///     .amount(40)
///     .reserve_rate(5)
///     .build();
/// let stored = repository.create(&bolt)?;
/// repository.update_quantity(&stored.id, 35)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository<P> {
    provider: P,
}

impl<P: ConnectionProvider> ItemRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Insert `item` and return the stored record as read back from the database.
    ///
    /// `item.id` is ignored; the database assigns it. The unit label is
    /// resolved (or inserted) first.
    pub fn create(&self, item: &Item) -> Result<Item, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("create").entered();

        let conn = self.provider.acquire()?;
        let unit_id = resolve_unit_id(&conn, &item.unit)?;

        let row = conn.query_one(
            queries::INSERT_ITEM,
            &[
                Value::from(item.vendor.as_str()),
                Value::from(item.name.as_str()),
                Value::Int(Some(unit_id)),
                decimal_value(item.weight),
                Value::Int(item.amount),
                Value::Int(Some(item.reserve_rate)),
            ],
        )?;
        let id = row.get_i32("id")?;
        log::debug!("inserted item {id} ({})", item.name);

        find_by_id(&conn, id)?.ok_or_else(|| {
            RepositoryError::Query(format!("item {id} not found right after insert"))
        })
    }

    /// Set `amount` of item `id`. Returns `false` when no such item exists.
    pub fn update_quantity(&self, id: &str, quantity: i32) -> Result<bool, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("update_quantity").entered();

        let id = parse_id(id)?;
        let conn = self.provider.acquire()?;
        let affected = conn.execute(
            queries::UPDATE_ITEM_QUANTITY_BY_ID,
            &[Value::Int(Some(quantity)), Value::Int(Some(id))],
        )?;
        log::debug!("update_quantity item {id} -> {quantity}: {affected} row(s)");
        Ok(affected > 0)
    }

    /// Overwrite vendor, name, unit, weight and reserve rate of item `id`.
    ///
    /// `item.id` and `item.amount` are ignored. Returns `false` when no such
    /// item exists; the unit label may still have been inserted in that case.
    pub fn update(&self, id: &str, item: &Item) -> Result<bool, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("update").entered();

        let id = parse_id(id)?;
        let conn = self.provider.acquire()?;
        let unit_id = resolve_unit_id(&conn, &item.unit)?;
        let affected = conn.execute(
            queries::UPDATE_ITEM,
            &[
                Value::from(item.vendor.as_str()),
                Value::from(item.name.as_str()),
                Value::Int(Some(unit_id)),
                decimal_value(item.weight),
                Value::Int(Some(item.reserve_rate)),
                Value::Int(Some(id)),
            ],
        )?;
        log::debug!("update item {id}: {affected} row(s)");
        Ok(affected > 0)
    }

    /// All items that are not soft-deleted, by ascending id.
    pub fn read_all(&self) -> Result<Vec<Item>, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("read_all").entered();

        let conn = self.provider.acquire()?;
        map_items(&conn, queries::GET_ALL_ITEMS, &[])
    }

    /// Items whose name contains `name` and whose amount lies in
    /// `[min_amount, max_amount]`.
    ///
    /// The match is a `LIKE '%name%'`: case-sensitive on PostgreSQL, and `%`
    /// or `_` inside `name` act as wildcards. Soft-deleted items never match
    /// because a NULL amount fails the range test.
    pub fn read_by_name_and_amount(
        &self,
        name: &str,
        min_amount: i32,
        max_amount: i32,
    ) -> Result<Vec<Item>, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("read_by_name_and_amount").entered();

        let conn = self.provider.acquire()?;
        map_items(
            &conn,
            queries::GET_ALL_ITEMS_BY_NAME_AND_AMOUNT,
            &[
                Value::from(format!("%{name}%")),
                Value::Int(Some(min_amount)),
                Value::Int(Some(max_amount)),
            ],
        )
    }

    /// First item (lowest id) from `vendor`, soft-deleted or not.
    pub fn read_by_vendor(&self, vendor: &str) -> Result<Option<Item>, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("read_by_vendor").entered();

        let conn = self.provider.acquire()?;
        conn.query_opt(queries::GET_ITEM_BY_VENDOR, &[Value::from(vendor)])?
            .as_ref()
            .map(Item::from_row)
            .transpose()
    }

    /// Item `id`, soft-deleted or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidId` when `id` is not an integer.
    pub fn read_by_id(&self, id: &str) -> Result<Option<Item>, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("read_by_id").entered();

        let id = parse_id(id)?;
        let conn = self.provider.acquire()?;
        find_by_id(&conn, id)
    }

    /// Soft-delete item `id` by clearing its amount. The row is kept.
    pub fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("delete").entered();

        let id = parse_id(id)?;
        let conn = self.provider.acquire()?;
        let affected = conn.execute(queries::SET_AMOUNT_NULL, &[Value::Int(Some(id))])?;
        log::debug!("soft-deleted item {id}: {affected} row(s)");
        Ok(affected > 0)
    }

    /// Ids of all items that are not soft-deleted, ascending.
    pub fn read_all_available_id(&self) -> Result<Vec<String>, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("read_all_available_id").entered();

        let conn = self.provider.acquire()?;
        conn.query_all(queries::GET_ALL_ITEMS_ID, &[])?
            .iter()
            .map(|row| row.get_i32("id").map(|id| id.to_string()))
            .collect()
    }

    /// Items named exactly `name`, via the `get_all_items_by_name` function.
    ///
    /// Filtering and ordering are decided server-side.
    pub fn read_all_by_name(&self, name: &str) -> Result<Vec<Item>, RepositoryError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_operation_span("read_all_by_name").entered();

        let conn = self.provider.acquire()?;
        map_items(&conn, queries::GET_ALL_ITEMS_BY_NAME, &[Value::from(name)])
    }
}

fn parse_id(id: &str) -> Result<i32, RepositoryError> {
    id.parse::<i32>()
        .map_err(|e| RepositoryError::invalid_id(id, e))
}

fn find_by_id<E: SqlExecutor>(conn: &E, id: i32) -> Result<Option<Item>, RepositoryError> {
    conn.query_opt(queries::GET_ITEM_BY_ID, &[Value::Int(Some(id))])?
        .as_ref()
        .map(Item::from_row)
        .transpose()
}

fn map_items<E: SqlExecutor>(
    conn: &E,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Item>, RepositoryError> {
    conn.query_all(sql, params)?.iter().map(Item::from_row).collect()
}

/// Look up the id of `unit`, inserting the label when it is new.
fn resolve_unit_id<E: SqlExecutor>(conn: &E, unit: &str) -> Result<i32, RepositoryError> {
    if let Some(row) = conn.query_opt(queries::GET_UNIT_ID_BY_VALUE, &[Value::from(unit)])? {
        return row.get_i32("id");
    }
    let row = conn.query_one(queries::INSERT_UNIT, &[Value::from(unit)])?;
    let id = row.get_i32("id")?;
    log::info!("registered new unit '{unit}' as {id}");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDatabase;
    use fake::faker::company::en::CompanyName;
    use fake::faker::lorem::en::Word;
    use fake::Fake;
    use rust_decimal::Decimal;

    fn item(vendor: &str, name: &str, unit: &str, amount: i32) -> Item {
        Item::builder()
            .vendor(vendor)
            .name(name)
            .unit(unit)
            .weight(Decimal::new(250, 2))
            .amount(amount)
            .reserve_rate(1)
            .build()
    }

    fn fake_item(unit: &str) -> Item {
        let vendor: String = CompanyName().fake();
        let name: String = Word().fake();
        let amount: i32 = (0..500).fake();
        item(&vendor, &name, unit, amount)
    }

    fn repository() -> (MockDatabase, ItemRepository<MockDatabase>) {
        let db = MockDatabase::new();
        (db.clone(), ItemRepository::new(db))
    }

    #[test]
    fn test_create_assigns_id_and_reads_back() {
        let (db, repo) = repository();
        let input = fake_item("kg");

        let created = repo.create(&input).unwrap();
        assert_eq!(created.id, "1");
        assert_eq!(created.vendor, input.vendor);
        assert_eq!(created.name, input.name);
        assert_eq!(created.unit, "kg");
        assert_eq!(created.weight, input.weight);
        assert_eq!(created.amount, input.amount);

        let read = repo.read_by_id(&created.id).unwrap();
        assert_eq!(read, Some(created));
        assert_eq!(db.open_connections(), 0);
    }

    #[test]
    fn test_create_ignores_caller_id() {
        let (_db, repo) = repository();
        let mut input = fake_item("pcs");
        input.id = "999".to_string();
        let created = repo.create(&input).unwrap();
        assert_eq!(created.id, "1");
    }

    #[test]
    fn test_create_uses_one_connection() {
        let (db, repo) = repository();
        repo.create(&fake_item("kg")).unwrap();
        assert_eq!(db.acquisitions(), 1);
    }

    #[test]
    fn test_units_are_deduplicated() {
        let (db, repo) = repository();
        repo.create(&fake_item("kg")).unwrap();
        repo.create(&fake_item("kg")).unwrap();
        repo.create(&fake_item("box")).unwrap();
        assert_eq!(db.unit_rows("kg"), 1);
        assert_eq!(db.unit_rows("box"), 1);
    }

    #[test]
    fn test_update_quantity_reflected_in_read() {
        let (_db, repo) = repository();
        let created = repo.create(&fake_item("kg")).unwrap();

        assert!(repo.update_quantity(&created.id, 77).unwrap());
        let read = repo.read_by_id(&created.id).unwrap().unwrap();
        assert_eq!(read.amount, Some(77));
    }

    #[test]
    fn test_update_and_update_quantity_on_missing_id_return_false() {
        let (db, repo) = repository();
        assert!(!repo.update_quantity("12", 5).unwrap());
        assert!(!repo.update("12", &fake_item("kg")).unwrap());
        assert_eq!(db.open_connections(), 0);
    }

    #[test]
    fn test_update_overwrites_fields_but_not_amount() {
        let (db, repo) = repository();
        let created = repo.create(&item("V1", "Bolt", "kg", 10)).unwrap();

        let mut changed = item("V2", "Bolt XL", "box", 999);
        changed.weight = Decimal::new(75, 1);
        changed.reserve_rate = 4;
        assert!(repo.update(&created.id, &changed).unwrap());

        let read = repo.read_by_id(&created.id).unwrap().unwrap();
        assert_eq!(read.vendor, "V2");
        assert_eq!(read.name, "Bolt XL");
        assert_eq!(read.unit, "box");
        assert_eq!(read.weight, Decimal::new(75, 1));
        assert_eq!(read.reserve_rate, 4);
        assert_eq!(read.amount, Some(10));
        assert_eq!(db.unit_rows("box"), 1);
    }

    #[test]
    fn test_delete_is_soft() {
        let (_db, repo) = repository();
        let kept = repo.create(&item("V", "Kept", "kg", 1)).unwrap();
        let gone = repo.create(&item("V", "Gone", "kg", 2)).unwrap();

        assert!(repo.delete(&gone.id).unwrap());

        let all = repo.read_all().unwrap();
        assert_eq!(all, vec![kept.clone()]);
        assert_eq!(repo.read_all_available_id().unwrap(), vec![kept.id]);

        let still_there = repo.read_by_id(&gone.id).unwrap().unwrap();
        assert_eq!(still_there.amount, None);
        assert!(still_there.is_deleted());
    }

    #[test]
    fn test_delete_missing_id_returns_false() {
        let (_db, repo) = repository();
        assert!(!repo.delete("3").unwrap());
    }

    #[test]
    fn test_read_all_orders_by_id() {
        let (_db, repo) = repository();
        for n in 0..5 {
            repo.create(&item("V", &format!("Item{n}"), "kg", n)).unwrap();
        }
        let ids: Vec<String> = repo.read_all().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(repo.read_all_available_id().unwrap(), ids);
    }

    #[test]
    fn test_read_by_name_and_amount() {
        let (_db, repo) = repository();
        let bolt = repo.create(&item("V", "Bolt", "pcs", 5)).unwrap();
        repo.create(&item("V", "Bolt2", "pcs", 15)).unwrap();
        repo.create(&item("V", "Screw", "pcs", 10)).unwrap();

        let found = repo.read_by_name_and_amount("Bolt", 0, 10).unwrap();
        assert_eq!(found, vec![bolt]);
    }

    #[test]
    fn test_read_by_name_and_amount_bounds_inclusive_and_skip_deleted() {
        let (_db, repo) = repository();
        let low = repo.create(&item("V", "Hex Bolt", "pcs", 5)).unwrap();
        let high = repo.create(&item("V", "Bolt long", "pcs", 10)).unwrap();
        let deleted = repo.create(&item("V", "Bolt old", "pcs", 7)).unwrap();
        repo.delete(&deleted.id).unwrap();

        let found = repo.read_by_name_and_amount("Bolt", 5, 10).unwrap();
        assert_eq!(found, vec![low, high]);
    }

    #[test]
    fn test_read_by_name_and_amount_is_case_sensitive() {
        let (_db, repo) = repository();
        repo.create(&item("V", "Bolt", "pcs", 5)).unwrap();
        assert!(repo.read_by_name_and_amount("bolt", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_read_by_vendor_first_match_or_none() {
        let (_db, repo) = repository();
        let first = repo.create(&item("ACME", "Nut", "pcs", 1)).unwrap();
        repo.create(&item("ACME", "Washer", "pcs", 2)).unwrap();

        assert_eq!(repo.read_by_vendor("ACME").unwrap(), Some(first));
        assert_eq!(repo.read_by_vendor("Nobody").unwrap(), None);
    }

    #[test]
    fn test_read_by_vendor_returns_deleted_item() {
        let (_db, repo) = repository();
        let created = repo.create(&item("Initech", "Stapler", "pcs", 4)).unwrap();
        assert!(repo.delete(&created.id).unwrap());

        let found = repo.read_by_vendor("Initech").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.amount, None);
        assert!(repo.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_create_without_amount_is_already_deleted() {
        let (_db, repo) = repository();
        let input = Item::builder()
            .vendor("V")
            .name("Spare")
            .unit("pcs")
            .weight(Decimal::new(1, 0))
            .reserve_rate(0)
            .build();
        assert_eq!(input.amount, None);

        let created = repo.create(&input).unwrap();
        assert_eq!(created.amount, None);
        assert!(repo.read_all().unwrap().is_empty());
        assert!(repo.read_all_available_id().unwrap().is_empty());

        let read = repo.read_by_id(&created.id).unwrap().unwrap();
        assert!(read.is_deleted());
        assert_eq!(read.name, "Spare");
    }

    #[test]
    fn test_read_by_id_missing_is_none() {
        let (_db, repo) = repository();
        assert_eq!(repo.read_by_id("41").unwrap(), None);
    }

    #[test]
    fn test_non_integer_id_is_error_without_connection() {
        let (db, repo) = repository();
        for call in [
            repo.read_by_id("not-an-integer").map(|_| ()),
            repo.update_quantity("x1", 3).map(|_| ()),
            repo.update("", &fake_item("kg")).map(|_| ()),
            repo.delete("1.5").map(|_| ()),
            repo.read_by_id(" 1\n").map(|_| ()),
            repo.delete("\t1").map(|_| ()),
        ] {
            assert!(matches!(call, Err(RepositoryError::InvalidId { .. })));
        }
        assert_eq!(db.acquisitions(), 0);
    }

    #[test]
    fn test_read_all_by_name_exact_match() {
        let (db, repo) = repository();
        let a = repo.create(&item("V1", "Gear", "pcs", 1)).unwrap();
        repo.create(&item("V2", "Gearbox", "pcs", 2)).unwrap();
        let b = repo.create(&item("V3", "Gear", "kg", 3)).unwrap();

        assert_eq!(repo.read_all_by_name("Gear").unwrap(), vec![a, b]);
        assert!(repo.read_all_by_name("gear").unwrap().is_empty());
        assert_eq!(db.procedure_calls(), 2);
    }

    #[test]
    fn test_connection_failure_surfaces_as_error() {
        let (db, repo) = repository();
        db.fail_next_acquire();
        assert!(matches!(repo.read_all(), Err(RepositoryError::Connection(_))));
        assert!(repo.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_statement_failure_releases_connection() {
        let (db, repo) = repository();
        let created = repo.create(&fake_item("kg")).unwrap();

        db.fail_next_statement();
        assert!(matches!(
            repo.update_quantity(&created.id, 1),
            Err(RepositoryError::Query(_))
        ));
        assert_eq!(db.open_connections(), 0);

        db.fail_next_statement();
        assert!(repo.create(&fake_item("kg")).is_err());
        assert_eq!(db.open_connections(), 0);
    }

    #[test]
    fn test_parse_id_rejects_padded_ids() {
        assert_eq!(parse_id("7").unwrap(), 7);
        assert_eq!(parse_id("-3").unwrap(), -3);
        for id in [" 7 ", "7\n", "\t7", "seven"] {
            assert!(
                matches!(parse_id(id), Err(RepositoryError::InvalidId { .. })),
                "{id:?} should not parse"
            );
        }
    }
}
