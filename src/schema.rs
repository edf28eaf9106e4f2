//! Reference DDL for the inventory schema.
//!
//! Production databases are provisioned outside this crate; these statements
//! exist so tests (and local setups) can build an identical schema. Each entry
//! is a single statement so it can go through the extended query protocol.

/// Drops and recreates `units`, `items` and `get_all_items_by_name`, in order
pub const STATEMENTS: &[&str] = &[
    "DROP FUNCTION IF EXISTS get_all_items_by_name(TEXT)",
    "DROP TABLE IF EXISTS items",
    "DROP TABLE IF EXISTS units",
    "CREATE TABLE units (
        id SERIAL PRIMARY KEY,
        unit TEXT NOT NULL
    )",
    "CREATE TABLE items (
        id SERIAL PRIMARY KEY,
        vendor TEXT NOT NULL,
        name TEXT NOT NULL,
        unit_id INTEGER NOT NULL REFERENCES units (id),
        weight NUMERIC NOT NULL,
        amount INTEGER,
        reserve_rate INTEGER NOT NULL
    )",
    "CREATE FUNCTION get_all_items_by_name(p_name TEXT)
     RETURNS TABLE (
        id INTEGER,
        vendor TEXT,
        name TEXT,
        unit TEXT,
        weight NUMERIC,
        amount INTEGER,
        reserve_rate INTEGER
     )
     LANGUAGE sql STABLE
     AS $$
        SELECT items.id, items.vendor, items.name, units.unit,
               items.weight, items.amount, items.reserve_rate
        FROM items JOIN units ON items.unit_id = units.id
        WHERE items.name = p_name
        ORDER BY items.id
     $$",
];
