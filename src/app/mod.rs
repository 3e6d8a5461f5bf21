// ==========================================
// 库存成本核算系统 - 应用层
// ==========================================
// 职责: 组装仓储、引擎与 API，解析默认数据库路径
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
