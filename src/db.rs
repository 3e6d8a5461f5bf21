// ==========================================
// 库存成本核算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，保证级联删除（批次 → 分配）在每个连接上生效
// - 统一 busy_timeout，减少偶发 busy 错误
// - 建表脚本集中维护（幂等，可重复执行）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（import_batches / sale_batch_allocations 依赖 ON DELETE CASCADE）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 创建全部业务表（IF NOT EXISTS，幂等）
///
/// 唯一约束只作为兜底：编码映射的四条规则由 ProductCodeRegistry 在写入前显式校验。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            ordered_price REAL NOT NULL,
            quantity INTEGER NOT NULL,
            supplier TEXT,
            supplier_id INTEGER,
            notes TEXT,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            currency TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            import_id INTEGER NOT NULL UNIQUE REFERENCES imports(id) ON DELETE CASCADE,
            batch_date TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            original_quantity INTEGER NOT NULL,
            remaining_quantity INTEGER NOT NULL CHECK (remaining_quantity >= 0),
            unit_cost REAL NOT NULL,
            unit_cost_orig REAL NOT NULL,
            currency TEXT NOT NULL,
            fx_to_base REAL,
            supplier TEXT,
            batch_notes TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_batches_item_date
            ON import_batches(category, subcategory, batch_date, id);

        CREATE TABLE IF NOT EXISTS sale_batch_allocations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id TEXT NOT NULL,
            sale_date TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            batch_id INTEGER NOT NULL REFERENCES import_batches(id) ON DELETE CASCADE,
            quantity_from_batch INTEGER NOT NULL,
            unit_cost REAL NOT NULL,
            unit_sale_price REAL NOT NULL,
            profit_per_unit REAL NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_allocations_batch ON sale_batch_allocations(batch_id);
        CREATE INDEX IF NOT EXISTS idx_allocations_product ON sale_batch_allocations(product_id);

        CREATE TABLE IF NOT EXISTS product_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            cat_code TEXT NOT NULL,
            sub_code TEXT NOT NULL,
            next_serial INTEGER NOT NULL DEFAULT 1,
            UNIQUE(category, subcategory),
            UNIQUE(category, sub_code)
        );

        CREATE TABLE IF NOT EXISTS inventory (
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            last_updated TEXT NOT NULL,
            PRIMARY KEY (category, subcategory)
        );

        CREATE TABLE IF NOT EXISTS fx_cache (
            date TEXT NOT NULL,
            from_ccy TEXT NOT NULL,
            to_ccy TEXT NOT NULL,
            rate REAL NOT NULL,
            PRIMARY KEY (date, from_ccy, to_ccy)
        );

        CREATE TABLE IF NOT EXISTS usd_try_rates (
            date TEXT PRIMARY KEY,
            rate_to_base REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            action_type TEXT NOT NULL,
            entity TEXT NOT NULL,
            ref_id TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_ts ON action_log(action_ts);
        CREATE INDEX IF NOT EXISTS idx_action_actor_ts ON action_log(actor, action_ts);
        CREATE INDEX IF NOT EXISTS idx_action_entity_ref ON action_log(entity, ref_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
