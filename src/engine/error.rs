// ==========================================
// 库存成本核算系统 - 引擎层错误类型
// ==========================================
// 区分: 可预期的业务拒绝（映射冲突/缺少映射/权限）与存储失败（透传）
// 说明: 汇率不可用不在此列，由 FxRateResolver 以 None 表达并降级
// ==========================================

use crate::domain::product_code::MappingConflict;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 商品编码 =====
    #[error("编码映射冲突: {0}")]
    ConflictingMapping(MappingConflict),

    #[error("未配置编码映射: category={category}, subcategory={subcategory}")]
    NoMapping {
        category: String,
        subcategory: String,
    },

    #[error("编码格式无效 (field={field}): {value}")]
    InvalidCode { field: String, value: String },

    #[error("流水号已用尽: {category}/{subcategory}, next_serial={next_serial}, requested={requested}")]
    SerialExhausted {
        category: String,
        subcategory: String,
        next_serial: i64,
        requested: i64,
    },

    // ===== 批次台账 =====
    #[error("进货记录不存在: import_id={0}")]
    ImportNotFound(i64),

    #[error("新数量低于已售数量: import_id={import_id}, consumed={consumed}, requested={requested}")]
    QuantityBelowConsumed {
        import_id: i64,
        consumed: i64,
        requested: i64,
    },

    // ===== 权限 =====
    #[error("权限不足: 需要角色 {required}, 当前角色 {actual}")]
    Forbidden { required: String, actual: String },

    // ===== 通用 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type EngineResult<T> = Result<T, EngineError>;
