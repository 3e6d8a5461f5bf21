// ==========================================
// 库存成本核算系统 - 商品编码映射数据仓储
// ==========================================
// 对齐: product_codes 表
// 说明: UNIQUE(category, subcategory) / UNIQUE(category, sub_code) 仅为兜底,
//       四条映射规则由 ProductCodeRegistry 在写入前校验
// ==========================================

use crate::domain::product_code::ProductCodeMapping;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// 流水号预留结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialReservation {
    /// 已预留 [first_serial, first_serial + count)；mapping 为预留前的映射
    Reserved {
        mapping: ProductCodeMapping,
        first_serial: i64,
    },
    /// 映射不存在
    NoMapping,
    /// 超出流水号上限（未做任何修改）
    Exhausted { next_serial: i64 },
}

// ==========================================
// ProductCodeRepository - 编码映射仓储
// ==========================================
pub struct ProductCodeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductCodeRepository {
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

    /// 查询全部映射
    pub fn list_all(&self) -> RepositoryResult<Vec<ProductCodeMapping>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, category, subcategory, cat_code, sub_code, next_serial
            FROM product_codes
            ORDER BY cat_code, sub_code
            "#,
        )?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按 (品类, 子品类) 查询映射
    pub fn find_by_pair(
        &self,
        category: &str,
        subcategory: &str,
    ) -> RepositoryResult<Option<ProductCodeMapping>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, category, subcategory, cat_code, sub_code, next_serial
                FROM product_codes
                WHERE category = ?1 AND subcategory = ?2
                "#,
                params![category, subcategory],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 按 (品类, 子品类) 写入映射
    ///
    /// next_serial 只增不减：取已有值与传入值中较大者。
    pub fn upsert(&self, mapping: &ProductCodeMapping) -> RepositoryResult<ProductCodeMapping> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO product_codes (category, subcategory, cat_code, sub_code, next_serial)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(category, subcategory) DO UPDATE SET
                cat_code = excluded.cat_code,
                sub_code = excluded.sub_code,
                next_serial = MAX(product_codes.next_serial, excluded.next_serial)
            "#,
            params![
                mapping.category,
                mapping.subcategory,
                mapping.cat_code,
                mapping.sub_code,
                mapping.next_serial,
            ],
        )?;

        let stored = conn.query_row(
            r#"
            SELECT id, category, subcategory, cat_code, sub_code, next_serial
            FROM product_codes
            WHERE category = ?1 AND subcategory = ?2
            "#,
            params![mapping.category, mapping.subcategory],
            map_row,
        )?;
        Ok(stored)
    }

    /// 预留 count 个连续流水号，并在同一 IMMEDIATE 事务内推进 next_serial
    pub fn reserve_serials(
        &self,
        category: &str,
        subcategory: &str,
        count: i64,
        max_serial: i64,
    ) -> RepositoryResult<SerialReservation> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mapping = tx
            .query_row(
                r#"
                SELECT id, category, subcategory, cat_code, sub_code, next_serial
                FROM product_codes
                WHERE category = ?1 AND subcategory = ?2
                "#,
                params![category, subcategory],
                map_row,
            )
            .optional()?;

        let mapping = match mapping {
            Some(m) => m,
            None => return Ok(SerialReservation::NoMapping),
        };

        let first_serial = mapping.next_serial;
        let available = max_serial.saturating_sub(first_serial).saturating_add(1);
        if count > available {
            return Ok(SerialReservation::Exhausted {
                next_serial: first_serial,
            });
        }

        tx.execute(
            "UPDATE product_codes SET next_serial = next_serial + ?1 WHERE id = ?2",
            params![count, mapping.id],
        )?;
        tx.commit()?;

        Ok(SerialReservation::Reserved {
            mapping,
            first_serial,
        })
    }
}

fn map_row(row: &Row) -> SqliteResult<ProductCodeMapping> {
    Ok(ProductCodeMapping {
        id: Some(row.get(0)?),
        category: row.get(1)?,
        subcategory: row.get(2)?,
        cat_code: row.get(3)?,
        sub_code: row.get(4)?,
        next_serial: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ProductCodeRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ProductCodeRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn mapping(next_serial: i64) -> ProductCodeMapping {
        ProductCodeMapping {
            id: None,
            category: "Widgets".to_string(),
            subcategory: "Blue".to_string(),
            cat_code: "001".to_string(),
            sub_code: "002".to_string(),
            next_serial,
        }
    }

    #[test]
    fn test_upsert_never_lowers_next_serial() {
        let repo = setup();

        let first = repo.upsert(&mapping(10)).unwrap();
        let second = repo.upsert(&mapping(1)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.next_serial, 10);
    }

    #[test]
    fn test_reserve_serials_advances() {
        let repo = setup();
        repo.upsert(&mapping(1)).unwrap();

        let r = repo.reserve_serials("Widgets", "Blue", 5, 9_999).unwrap();
        assert!(matches!(r, SerialReservation::Reserved { first_serial: 1, .. }));

        let stored = repo.find_by_pair("Widgets", "Blue").unwrap().unwrap();
        assert_eq!(stored.next_serial, 6);
    }

    #[test]
    fn test_reserve_serials_missing_and_exhausted() {
        let repo = setup();
        assert_eq!(
            repo.reserve_serials("Nope", "Nope", 1, 9_999).unwrap(),
            SerialReservation::NoMapping
        );

        repo.upsert(&mapping(9_998)).unwrap();
        assert_eq!(
            repo.reserve_serials("Widgets", "Blue", 3, 9_999).unwrap(),
            SerialReservation::Exhausted { next_serial: 9_998 }
        );
        assert_eq!(
            repo.find_by_pair("Widgets", "Blue").unwrap().unwrap().next_serial,
            9_998
        );
    }

    #[test]
    fn test_reserve_serials_huge_count_is_exhausted() {
        let repo = setup();
        repo.upsert(&mapping(5)).unwrap();

        assert_eq!(
            repo.reserve_serials("Widgets", "Blue", i64::MAX, 9_999).unwrap(),
            SerialReservation::Exhausted { next_serial: 5 }
        );

        // 连接未被毒化，后续预留正常
        let r = repo.reserve_serials("Widgets", "Blue", 1, 9_999).unwrap();
        assert!(matches!(r, SerialReservation::Reserved { first_serial: 5, .. }));
    }
}
