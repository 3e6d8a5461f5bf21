// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 基于临时数据库与假汇率源组装完整 AppState
// ==========================================

#[path = "../test_helpers.rs"]
mod test_helpers;

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::NamedTempFile;

use stock_costing::app::AppState;
use stock_costing::cipher::default_cipher;
use stock_costing::domain::{NewImport, SaleRequest, Session, ROLE_ADMIN, ROLE_OPERATOR};

use super::mock_rate_source::MockRateSource;

/// API测试环境
pub struct ApiTestEnv {
    pub db_path: String,
    pub state: AppState,
    pub source: Arc<MockRateSource>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建测试环境（本位币默认 TRY）
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let (temp_file, db_path) = test_helpers::create_test_db()?;
        let source = Arc::new(MockRateSource::new());
        let state = AppState::with_components(db_path.clone(), source.clone(), default_cipher())?;

        Ok(Self {
            db_path,
            state,
            source,
            _temp_file: temp_file,
        })
    }

    /// 以当前状态的数据库重新组装 AppState（模拟重启）
    pub fn restart(&self) -> Result<AppState, String> {
        AppState::with_components(self.db_path.clone(), self.source.clone(), default_cipher())
    }
}

pub fn admin() -> Session {
    Session::new("ayse", ROLE_ADMIN)
}

pub fn operator() -> Session {
    Session::new("mehmet", ROLE_OPERATOR)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn new_import(
    day: NaiveDate,
    category: &str,
    subcategory: &str,
    quantity: i64,
    price: f64,
    currency: &str,
) -> NewImport {
    NewImport {
        date: day,
        ordered_price: price,
        quantity,
        supplier: Some("Acme Ltd".to_string()),
        supplier_id: None,
        notes: None,
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        currency: currency.to_string(),
    }
}

pub fn sale(
    day: NaiveDate,
    category: &str,
    subcategory: &str,
    quantity: i64,
    price: f64,
    currency: Option<&str>,
) -> SaleRequest {
    SaleRequest {
        product_id: "240010020001".to_string(),
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        quantity,
        sale_date: day,
        unit_sale_price: price,
        currency: currency.map(str::to_string),
    }
}
