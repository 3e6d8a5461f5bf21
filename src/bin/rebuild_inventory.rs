// Small maintenance utility: rebuild the inventory snapshot of a database file from its imports.
//
// Usage:
//   cargo run --bin rebuild_inventory -- [db_path]
//
// Creates missing tables first, so it is safe to point at an empty file.

use stock_costing::db::{init_schema, open_sqlite_connection, read_schema_version};
use stock_costing::engine::InventoryAggregate;
use stock_costing::repository::InventoryRepository;
use std::sync::{Arc, Mutex};

fn main() -> anyhow::Result<()> {
    stock_costing::logging::init();

    let db_path = std::env::args()
        .nth(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(stock_costing::app::get_default_db_path);

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let schema_version = read_schema_version(&conn)?;

    let aggregate = InventoryAggregate::new(Arc::new(InventoryRepository::new(Arc::new(
        Mutex::new(conn),
    ))));
    let rows = aggregate.rebuild()?;

    println!("db_path={}", db_path);
    println!("schema_version={}", schema_version.unwrap_or(0));
    println!("inventory_rows={}", rows);
    for snapshot in aggregate.list()? {
        println!(
            "{}/{}\t{}",
            snapshot.category, snapshot.subcategory, snapshot.quantity
        );
    }
    Ok(())
}
