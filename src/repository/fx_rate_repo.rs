// ==========================================
// 库存成本核算系统 - 汇率缓存数据仓储
// ==========================================
// 对齐: fx_cache 表（通用缓存，键 = (date, from, to)）
// 对齐: usd_try_rates 表（USD/TRY 本地日汇率，Date → RateToBase）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult, DATE_FMT};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// FxRateRepository - 汇率仓储
// ==========================================
pub struct FxRateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FxRateRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 通用缓存 =====

    /// 读取缓存汇率（币种需已规范化）
    pub fn get_cached(
        &self,
        date: NaiveDate,
        from_ccy: &str,
        to_ccy: &str,
    ) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let rate = conn
            .query_row(
                "SELECT rate FROM fx_cache WHERE date = ?1 AND from_ccy = ?2 AND to_ccy = ?3",
                params![date.format(DATE_FMT).to_string(), from_ccy, to_ccy],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rate)
    }

    /// 写入缓存汇率（同键覆盖为较新的值）
    pub fn put_cached(
        &self,
        date: NaiveDate,
        from_ccy: &str,
        to_ccy: &str,
        rate: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO fx_cache (date, from_ccy, to_ccy, rate) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(date, from_ccy, to_ccy) DO UPDATE SET rate = excluded.rate
            "#,
            params![date.format(DATE_FMT).to_string(), from_ccy, to_ccy, rate],
        )?;
        Ok(())
    }

    // ===== USD/TRY 本地日汇率 =====

    /// 读取某日 USD→TRY 汇率；日期不存在返回 None（不是错误）
    pub fn get_local_rate(&self, date: NaiveDate) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let rate = conn
            .query_row(
                "SELECT rate_to_base FROM usd_try_rates WHERE date = ?1",
                params![date.format(DATE_FMT).to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rate)
    }

    /// 写入某日 USD→TRY 汇率（已有则替换，否则追加）
    pub fn upsert_local_rate(&self, date: NaiveDate, rate_to_base: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO usd_try_rates (date, rate_to_base) VALUES (?1, ?2)
            ON CONFLICT(date) DO UPDATE SET rate_to_base = excluded.rate_to_base
            "#,
            params![date.format(DATE_FMT).to_string(), rate_to_base],
        )?;
        Ok(())
    }
}
