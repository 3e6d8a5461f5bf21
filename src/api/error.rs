// ==========================================
// 库存成本核算系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把引擎/仓储错误转换为面向用户的错误消息
// 约束: 映射冲突需携带违反的规则与冲突值；权限错误原样透出
// ==========================================

use crate::domain::product_code::MappingRule;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务拒绝
    // ==========================================
    #[error("权限不足: 需要角色 {required}, 当前角色 {actual}")]
    Forbidden { required: String, actual: String },

    #[error("编码映射冲突 [{rule}]: {message}")]
    ConflictingMapping {
        rule: MappingRule,
        existing: String,
        message: String,
    },

    #[error("未配置编码映射: {0}")]
    NoMapping(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("检查约束违反: {}", msg))
            }
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ConflictingMapping(conflict) => ApiError::ConflictingMapping {
                rule: conflict.rule,
                existing: conflict.existing,
                message: conflict.message,
            },
            EngineError::NoMapping {
                category,
                subcategory,
            } => ApiError::NoMapping(format!("{}/{}", category, subcategory)),
            EngineError::Forbidden { required, actual } => ApiError::Forbidden { required, actual },
            EngineError::ImportNotFound(id) => ApiError::NotFound(format!("进货(id={})不存在", id)),
            e @ EngineError::InvalidCode { .. } => ApiError::InvalidInput(e.to_string()),
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            e @ EngineError::SerialExhausted { .. } => {
                ApiError::BusinessRuleViolation(e.to_string())
            }
            e @ EngineError::QuantityBelowConsumed { .. } => {
                ApiError::BusinessRuleViolation(e.to_string())
            }
            EngineError::Repository(e) => ApiError::from(e),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
