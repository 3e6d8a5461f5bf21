// ==========================================
// 库存成本核算系统 - 商品编码映射领域模型
// ==========================================
// 对齐: product_codes 表
// 商品编号格式: YY + cat_code(3) + sub_code(3) + serial(4)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 品类编码宽度
pub const CAT_CODE_WIDTH: usize = 3;

/// 子品类编码宽度
pub const SUB_CODE_WIDTH: usize = 3;

/// 流水号宽度
pub const SERIAL_WIDTH: usize = 4;

/// 流水号上限（4 位）
pub const MAX_SERIAL: i64 = 9_999;

// ==========================================
// ProductCodeMapping - (品类, 子品类) → 编码
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCodeMapping {
    pub id: Option<i64>, // 未持久化时为 None
    pub category: String,
    pub subcategory: String,
    pub cat_code: String,
    pub sub_code: String,
    pub next_serial: i64,
}

// ==========================================
// MappingRule - 编码映射的四条双向唯一规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingRule {
    CatCodeOwnedByOtherCategory,   // cat_code 只属于一个品类
    CategoryHasOtherCatCode,       // 品类只对应一个 cat_code
    SubCodeOwnedByOtherSubcategory, // 同一品类内 sub_code 只属于一个子品类
    PairHasOtherSubCode,           // (品类, 子品类) 只对应一个 sub_code
}

impl MappingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingRule::CatCodeOwnedByOtherCategory => "CAT_CODE_UNIQUE",
            MappingRule::CategoryHasOtherCatCode => "CATEGORY_SINGLE_CAT_CODE",
            MappingRule::SubCodeOwnedByOtherSubcategory => "SUB_CODE_UNIQUE_IN_CATEGORY",
            MappingRule::PairHasOtherSubCode => "PAIR_SINGLE_SUB_CODE",
        }
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// MappingConflict - 违反规则的详情
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConflict {
    pub rule: MappingRule,
    pub existing: String, // 冲突的既有值
    pub message: String,
}

impl fmt::Display for MappingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}
