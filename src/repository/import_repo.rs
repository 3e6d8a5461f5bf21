// ==========================================
// 库存成本核算系统 - 进货与成本批次数据仓储
// ==========================================
// 对齐: imports / import_batches 表
// 红线: 进货与其批次同事务写入（一条进货恰好一个批次）
// 红线: Repository 不含业务逻辑（估值、剩余数量策略由 BatchLedger 决定）
// ==========================================

use crate::cipher::TextCipher;
use crate::domain::batch::{BatchValuation, ImportBatch};
use crate::domain::import::{ImportRecord, NewImport};
use crate::repository::error::{
    parse_date_column, parse_datetime_column, RepositoryError, RepositoryResult, DATE_FMT,
    DATETIME_FMT,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const IMPORT_COLUMNS: &str = "id, date, ordered_price, quantity, supplier, supplier_id, notes, \
     category, subcategory, currency";

const BATCH_COLUMNS: &str = "id, import_id, batch_date, category, subcategory, original_quantity, \
     remaining_quantity, unit_cost_orig, unit_cost, currency, fx_to_base, supplier, batch_notes, \
     created_at";

// ==========================================
// ImportRepository - 进货/批次仓储
// ==========================================
pub struct ImportRepository {
    conn: Arc<Mutex<Connection>>,
    cipher: Arc<dyn TextCipher>,
}

impl ImportRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>, cipher: Arc<dyn TextCipher>) -> Self {
        Self { conn, cipher }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn seal(&self, text: &Option<String>) -> Option<String> {
        text.as_deref().map(|t| self.cipher.encrypt(t))
    }

    fn open(&self, token: Option<String>) -> Option<String> {
        token.map(|t| self.cipher.decrypt(&t))
    }

    // ==========================================
    // 写入操作（进货 + 批次，同一事务）
    // ==========================================

    /// 新建进货并创建其成本批次（remaining = original = quantity）
    ///
    /// # 返回
    /// - Ok((ImportRecord, ImportBatch)): 已提交的进货与批次
    /// - Err: 数据库错误（整体回滚，不会留下孤立记录）
    pub fn insert_with_batch(
        &self,
        import: &NewImport,
        valuation: &BatchValuation,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<(ImportRecord, ImportBatch)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let supplier = self.seal(&import.supplier);
        let notes = self.seal(&import.notes);

        tx.execute(
            r#"
            INSERT INTO imports (
                date, ordered_price, quantity, supplier, supplier_id, notes,
                category, subcategory, currency
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                import.date.format(DATE_FMT).to_string(),
                import.ordered_price,
                import.quantity,
                supplier,
                import.supplier_id,
                notes,
                import.category,
                import.subcategory,
                import.currency,
            ],
        )?;
        let import_id = tx.last_insert_rowid();

        tx.execute(
            r#"
            INSERT INTO import_batches (
                import_id, batch_date, category, subcategory, original_quantity,
                remaining_quantity, unit_cost, unit_cost_orig, currency, fx_to_base,
                supplier, batch_notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                import_id,
                import.date.format(DATE_FMT).to_string(),
                import.category,
                import.subcategory,
                import.quantity,
                valuation.unit_cost_base,
                valuation.unit_cost,
                import.currency,
                valuation.fx_to_base,
                supplier,
                notes,
                created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        let batch_id = tx.last_insert_rowid();

        tx.commit()?;

        let record = ImportRecord {
            id: import_id,
            date: import.date,
            ordered_price: import.ordered_price,
            quantity: import.quantity,
            supplier: import.supplier.clone(),
            supplier_id: import.supplier_id,
            notes: import.notes.clone(),
            category: import.category.clone(),
            subcategory: import.subcategory.clone(),
            currency: import.currency.clone(),
        };
        let batch = ImportBatch {
            id: batch_id,
            import_id,
            batch_date: import.date,
            category: import.category.clone(),
            subcategory: import.subcategory.clone(),
            original_quantity: import.quantity,
            remaining_quantity: import.quantity,
            unit_cost: valuation.unit_cost,
            unit_cost_base: valuation.unit_cost_base,
            currency: import.currency.clone(),
            fx_to_base: valuation.fx_to_base,
            supplier: import.supplier.clone(),
            batch_notes: import.notes.clone(),
            created_at,
        };
        Ok((record, batch))
    }

    /// 编辑进货并同步其批次
    ///
    /// remaining_quantity 按 `quantity_delta` 增减（保留已售数量），
    /// 表上的 CHECK (remaining_quantity >= 0) 作为兜底。
    ///
    /// # 返回
    /// - Ok(ImportBatch): 更新后的批次
    /// - Err(NotFound): 进货或批次不存在
    pub fn update_with_batch(
        &self,
        import_id: i64,
        import: &NewImport,
        valuation: &BatchValuation,
        quantity_delta: i64,
    ) -> RepositoryResult<ImportBatch> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let supplier = self.seal(&import.supplier);
        let notes = self.seal(&import.notes);

        let updated = tx.execute(
            r#"
            UPDATE imports SET
                date = ?2, ordered_price = ?3, quantity = ?4, supplier = ?5,
                supplier_id = ?6, notes = ?7, category = ?8, subcategory = ?9, currency = ?10
            WHERE id = ?1
            "#,
            params![
                import_id,
                import.date.format(DATE_FMT).to_string(),
                import.ordered_price,
                import.quantity,
                supplier,
                import.supplier_id,
                notes,
                import.category,
                import.subcategory,
                import.currency,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "imports".to_string(),
                id: import_id.to_string(),
            });
        }

        let updated = tx.execute(
            r#"
            UPDATE import_batches SET
                batch_date = ?2, category = ?3, subcategory = ?4,
                original_quantity = ?5,
                remaining_quantity = remaining_quantity + ?6,
                unit_cost = ?7, unit_cost_orig = ?8, currency = ?9, fx_to_base = ?10,
                supplier = ?11, batch_notes = ?12
            WHERE import_id = ?1
            "#,
            params![
                import_id,
                import.date.format(DATE_FMT).to_string(),
                import.category,
                import.subcategory,
                import.quantity,
                quantity_delta,
                valuation.unit_cost_base,
                valuation.unit_cost,
                import.currency,
                valuation.fx_to_base,
                supplier,
                notes,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "import_batches".to_string(),
                id: import_id.to_string(),
            });
        }

        let batch = tx.query_row(
            &format!("SELECT {} FROM import_batches WHERE import_id = ?1", BATCH_COLUMNS),
            params![import_id],
            |row| self.map_batch_row(row),
        )?;

        tx.commit()?;
        Ok(batch)
    }

    /// 删除进货（批次与其销售分配通过 ON DELETE CASCADE 一并删除）
    ///
    /// # 返回
    /// - Ok(Some(ImportRecord)): 被删除的进货
    /// - Ok(None): 进货不存在
    pub fn delete_with_batch(&self, import_id: i64) -> RepositoryResult<Option<ImportRecord>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                &format!("SELECT {} FROM imports WHERE id = ?1", IMPORT_COLUMNS),
                params![import_id],
                |row| self.map_import_row(row),
            )
            .optional()?;

        if existing.is_some() {
            tx.execute("DELETE FROM imports WHERE id = ?1", params![import_id])?;
        }

        tx.commit()?;
        Ok(existing)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询进货
    pub fn find_import(&self, import_id: i64) -> RepositoryResult<Option<ImportRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM imports WHERE id = ?1", IMPORT_COLUMNS),
                params![import_id],
                |row| self.map_import_row(row),
            )
            .optional()?;
        Ok(record)
    }

    /// 查询全部进货（按日期倒序）
    pub fn list_imports(&self) -> RepositoryResult<Vec<ImportRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM imports ORDER BY date DESC, id DESC",
            IMPORT_COLUMNS
        ))?;
        let records = stmt
            .query_map([], |row| self.map_import_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    /// 查询进货对应的批次
    pub fn find_batch_by_import(&self, import_id: i64) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                &format!("SELECT {} FROM import_batches WHERE import_id = ?1", BATCH_COLUMNS),
                params![import_id],
                |row| self.map_batch_row(row),
            )
            .optional()?;
        Ok(batch)
    }

    /// 按ID查询批次
    pub fn find_batch(&self, batch_id: i64) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                &format!("SELECT {} FROM import_batches WHERE id = ?1", BATCH_COLUMNS),
                params![batch_id],
                |row| self.map_batch_row(row),
            )
            .optional()?;
        Ok(batch)
    }

    /// 查询品类/子品类下的全部批次（FIFO 顺序）
    pub fn list_batches_for_item(
        &self,
        category: &str,
        subcategory: &str,
    ) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_batches WHERE category = ?1 AND subcategory = ?2 \
             ORDER BY batch_date ASC, id ASC",
            BATCH_COLUMNS
        ))?;
        let batches = stmt
            .query_map(params![category, subcategory], |row| self.map_batch_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(batches)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_import_row(&self, row: &Row) -> SqliteResult<ImportRecord> {
        Ok(ImportRecord {
            id: row.get(0)?,
            date: parse_date_column(1, row.get(1)?)?,
            ordered_price: row.get(2)?,
            quantity: row.get(3)?,
            supplier: self.open(row.get(4)?),
            supplier_id: row.get(5)?,
            notes: self.open(row.get(6)?),
            category: row.get(7)?,
            subcategory: row.get(8)?,
            currency: row.get(9)?,
        })
    }

    fn map_batch_row(&self, row: &Row) -> SqliteResult<ImportBatch> {
        Ok(ImportBatch {
            id: row.get(0)?,
            import_id: row.get(1)?,
            batch_date: parse_date_column(2, row.get(2)?)?,
            category: row.get(3)?,
            subcategory: row.get(4)?,
            original_quantity: row.get(5)?,
            remaining_quantity: row.get(6)?,
            unit_cost: row.get(7)?,
            unit_cost_base: row.get(8)?,
            currency: row.get(9)?,
            fx_to_base: row.get(10)?,
            supplier: self.open(row.get(11)?),
            batch_notes: self.open(row.get(12)?),
            created_at: parse_datetime_column(13, row.get(13)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::TextCipher;
    use chrono::NaiveDate;

    // 简单的可逆“加密”，用于验证落库前确实经过 cipher
    struct ReverseCipher;

    impl TextCipher for ReverseCipher {
        fn encrypt(&self, text: &str) -> String {
            text.chars().rev().collect()
        }

        fn decrypt(&self, token: &str) -> String {
            token.chars().rev().collect()
        }
    }

    fn setup(cipher: Arc<dyn TextCipher>) -> (Arc<Mutex<Connection>>, ImportRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = ImportRepository::new(conn.clone(), cipher);
        (conn, repo)
    }

    fn sample_import(quantity: i64) -> NewImport {
        NewImport {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ordered_price: 5.0,
            quantity,
            supplier: Some("Acme".to_string()),
            supplier_id: Some(3),
            notes: Some("first lot".to_string()),
            category: "Widgets".to_string(),
            subcategory: "Blue".to_string(),
            currency: "USD".to_string(),
        }
    }

    fn valuation() -> BatchValuation {
        BatchValuation {
            unit_cost: 5.0,
            unit_cost_base: 10.0,
            fx_to_base: Some(2.0),
        }
    }

    fn created_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_insert_with_batch_creates_one_batch() {
        let (_conn, repo) = setup(crate::cipher::default_cipher());

        let (record, batch) = repo
            .insert_with_batch(&sample_import(10), &valuation(), created_at())
            .unwrap();

        assert_eq!(batch.import_id, record.id);
        assert_eq!(batch.original_quantity, 10);
        assert_eq!(batch.remaining_quantity, 10);

        let stored = repo.find_batch_by_import(record.id).unwrap().unwrap();
        assert_eq!(stored, batch);
        assert_eq!(stored.unit_cost, 5.0);
        assert_eq!(stored.unit_cost_base, 10.0);
    }

    #[test]
    fn test_free_text_is_sealed_at_rest() {
        let (conn, repo) = setup(Arc::new(ReverseCipher));

        let (record, _) = repo
            .insert_with_batch(&sample_import(1), &valuation(), created_at())
            .unwrap();

        let raw: String = conn
            .lock()
            .unwrap()
            .query_row("SELECT supplier FROM imports WHERE id = ?1", [record.id], |r| r.get(0))
            .unwrap();
        assert_eq!(raw, "emcA");

        let loaded = repo.find_import(record.id).unwrap().unwrap();
        assert_eq!(loaded.supplier.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_update_applies_quantity_delta() {
        let (_conn, repo) = setup(crate::cipher::default_cipher());
        let (record, _) = repo
            .insert_with_batch(&sample_import(10), &valuation(), created_at())
            .unwrap();

        let batch = repo
            .update_with_batch(record.id, &sample_import(15), &valuation(), 5)
            .unwrap();

        assert_eq!(batch.original_quantity, 15);
        assert_eq!(batch.remaining_quantity, 15);
        assert_eq!(repo.find_import(record.id).unwrap().unwrap().quantity, 15);
    }

    #[test]
    fn test_update_negative_remaining_rolls_back() {
        let (_conn, repo) = setup(crate::cipher::default_cipher());
        let (record, _) = repo
            .insert_with_batch(&sample_import(10), &valuation(), created_at())
            .unwrap();

        let result = repo.update_with_batch(record.id, &sample_import(1), &valuation(), -20);
        assert!(matches!(result, Err(RepositoryError::CheckConstraintViolation(_))));

        // 进货行也不应被修改
        assert_eq!(repo.find_import(record.id).unwrap().unwrap().quantity, 10);
    }

    #[test]
    fn test_update_missing_import() {
        let (_conn, repo) = setup(crate::cipher::default_cipher());
        let result = repo.update_with_batch(99, &sample_import(1), &valuation(), 0);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_delete_cascades_batch() {
        let (_conn, repo) = setup(crate::cipher::default_cipher());
        let (record, batch) = repo
            .insert_with_batch(&sample_import(10), &valuation(), created_at())
            .unwrap();

        let deleted = repo.delete_with_batch(record.id).unwrap();
        assert_eq!(deleted.map(|r| r.id), Some(record.id));
        assert!(repo.find_batch(batch.id).unwrap().is_none());
        assert!(repo.delete_with_batch(record.id).unwrap().is_none());
    }
}
