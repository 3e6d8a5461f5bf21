// ==========================================
// 库存成本核算系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录（审计为尽力而为，不与业务写入同事务）
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ActionLog - 操作日志（追加后不可变）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub entity: String,           // 实体名，如 "import" / "product_code"
    pub ref_id: Option<String>,   // 实体主键
    pub detail: Option<String>,   // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateImport,
    UpdateImport,
    DeleteImport,
    RecordSale,
    AssignProductCode,
    GenerateProductIds,
    RebuildInventory,
    UpdateSetting,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateImport => "CREATE_IMPORT",
            ActionType::UpdateImport => "UPDATE_IMPORT",
            ActionType::DeleteImport => "DELETE_IMPORT",
            ActionType::RecordSale => "RECORD_SALE",
            ActionType::AssignProductCode => "ASSIGN_PRODUCT_CODE",
            ActionType::GenerateProductIds => "GENERATE_PRODUCT_IDS",
            ActionType::RebuildInventory => "REBUILD_INVENTORY",
            ActionType::UpdateSetting => "UPDATE_SETTING",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
