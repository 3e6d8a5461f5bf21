// ==========================================
// 库存成本核算系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: settings 表 (key-value)
// ==========================================

use crate::domain::types::normalize_currency;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 settings 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取配置值，带默认值（空字符串视为未配置）
    fn get_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入配置值（UPSERT）
    pub fn set_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// 全部配置（按键排序）
    pub fn list_all(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
    }

    // ===== 币种配置 =====

    /// 本位币（所有成本与利润的统一口径）
    pub fn base_currency(&self) -> RepositoryResult<String> {
        let value = self.get_or_default(config_keys::BASE_CURRENCY, defaults::BASE_CURRENCY)?;
        Ok(normalize_currency(&value))
    }

    /// 进货默认币种
    pub fn default_import_currency(&self) -> RepositoryResult<String> {
        let value = self.get_or_default(
            config_keys::DEFAULT_IMPORT_CURRENCY,
            defaults::DEFAULT_IMPORT_CURRENCY,
        )?;
        Ok(normalize_currency(&value))
    }

    /// 销售默认币种
    pub fn default_sale_currency(&self) -> RepositoryResult<String> {
        let value = self.get_or_default(
            config_keys::DEFAULT_SALE_CURRENCY,
            defaults::DEFAULT_SALE_CURRENCY,
        )?;
        Ok(normalize_currency(&value))
    }

    /// 费用默认币种
    pub fn default_expense_currency(&self) -> RepositoryResult<String> {
        let value = self.get_or_default(
            config_keys::DEFAULT_EXPENSE_CURRENCY,
            defaults::DEFAULT_EXPENSE_CURRENCY,
        )?;
        Ok(normalize_currency(&value))
    }

    // ===== 汇率接口配置 =====

    /// 汇率接口主机名（不含协议）
    pub fn fx_api_host(&self) -> RepositoryResult<String> {
        self.get_or_default(config_keys::FX_API_HOST, defaults::FX_API_HOST)
    }

    /// 汇率请求超时
    pub fn fx_timeout(&self) -> RepositoryResult<Duration> {
        let value = self.get_or_default(config_keys::FX_TIMEOUT_SECS, "")?;
        let secs = value
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .unwrap_or(defaults::FX_TIMEOUT_SECS);
        Ok(Duration::from_secs(secs))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 币种
    pub const BASE_CURRENCY: &str = "base_currency";
    pub const DEFAULT_IMPORT_CURRENCY: &str = "default_import_currency";
    pub const DEFAULT_SALE_CURRENCY: &str = "default_sale_currency";
    pub const DEFAULT_EXPENSE_CURRENCY: &str = "default_expense_currency";

    // 汇率接口
    pub const FX_API_HOST: &str = "fx_api_host";
    pub const FX_TIMEOUT_SECS: &str = "fx_timeout_secs";
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const BASE_CURRENCY: &str = "TRY";
    pub const DEFAULT_IMPORT_CURRENCY: &str = "USD";
    pub const DEFAULT_SALE_CURRENCY: &str = "TRY";
    pub const DEFAULT_EXPENSE_CURRENCY: &str = "TRY";
    pub const FX_API_HOST: &str = "api.frankfurter.app";
    pub const FX_TIMEOUT_SECS: u64 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = setup();
        assert_eq!(config.base_currency().unwrap(), "TRY");
        assert_eq!(config.default_import_currency().unwrap(), "USD");
        assert_eq!(config.default_sale_currency().unwrap(), "TRY");
        assert_eq!(config.default_expense_currency().unwrap(), "TRY");
        assert_eq!(config.fx_api_host().unwrap(), "api.frankfurter.app");
        assert_eq!(config.fx_timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_set_value_overrides_and_normalizes() {
        let config = setup();
        config.set_value(config_keys::BASE_CURRENCY, " eur ").unwrap();
        config.set_value(config_keys::FX_TIMEOUT_SECS, "abc").unwrap();

        assert_eq!(config.base_currency().unwrap(), "EUR");
        assert_eq!(config.fx_timeout().unwrap(), Duration::from_secs(5));

        config.set_value(config_keys::FX_TIMEOUT_SECS, "2").unwrap();
        assert_eq!(config.fx_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(config.list_all().unwrap().len(), 2);
    }
}
