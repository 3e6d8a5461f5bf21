// ==========================================
// 库存成本核算系统 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表（只追加，不更新不删除）
// 红线: 所有写入必须记录
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
