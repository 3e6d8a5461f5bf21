// ==========================================
// 库存成本核算系统 - 配置层
// ==========================================
// 职责: 系统配置管理（本位币、默认币种、汇率接口）
// 存储: settings 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, defaults, ConfigManager};
