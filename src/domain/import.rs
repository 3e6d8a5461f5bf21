// ==========================================
// 库存成本核算系统 - 进货记录领域模型
// ==========================================
// 对齐: imports 表
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::types::{normalize_currency, ItemKey};

// ==========================================
// NewImport - 新建/编辑进货的输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImport {
    pub date: NaiveDate,
    pub ordered_price: f64, // 单价（进货币种）
    pub quantity: i64,
    pub supplier: Option<String>,
    pub supplier_id: Option<i64>,
    pub notes: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub currency: String,
}

impl NewImport {
    /// 规范化币种与品类名称前后空白
    pub fn normalized(mut self) -> Self {
        self.currency = normalize_currency(&self.currency);
        self.category = self.category.trim().to_string();
        self.subcategory = self.subcategory.trim().to_string();
        self
    }

    pub fn item_key(&self) -> ItemKey {
        ItemKey::new(&self.category, &self.subcategory)
    }
}

// ==========================================
// ImportRecord - 已持久化的进货记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub ordered_price: f64,
    pub quantity: i64,
    pub supplier: Option<String>,
    pub supplier_id: Option<i64>,
    pub notes: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub currency: String,
}

impl ImportRecord {
    pub fn item_key(&self) -> ItemKey {
        ItemKey::new(&self.category, &self.subcategory)
    }
}
