// ==========================================
// 库存成本核算系统 - 权限校验与审计
// ==========================================
// 职责: 按角色拦截破坏性操作；为每次写操作追加操作日志
// 红线: 审计为尽力而为，追加失败只记 warn，不中断业务操作
// 红线: 会话显式传入，不依赖进程级“当前用户”
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::Session;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::action_log_repo::ActionLogRepository;
use std::sync::Arc;

// ==========================================
// AccessGuard - 权限与审计
// ==========================================
pub struct AccessGuard {
    action_log_repo: Arc<ActionLogRepository>,
}

impl AccessGuard {
    pub fn new(action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self { action_log_repo }
    }

    /// 会话角色不等于 role（忽略大小写）时返回 Forbidden
    pub fn require_role(&self, session: &Session, role: &str) -> EngineResult<()> {
        if session.has_role(role) {
            return Ok(());
        }
        tracing::warn!(
            actor = %session.username,
            role = %session.role,
            required = role,
            "权限不足，操作被拒绝"
        );
        Err(EngineError::Forbidden {
            required: role.to_string(),
            actual: session.role.clone(),
        })
    }

    /// 追加操作日志
    ///
    /// # 返回
    /// - Some(action_id): 追加成功
    /// - None: 追加失败（已记录 warn）
    pub fn record(
        &self,
        session: &Session,
        action: ActionType,
        entity: &str,
        ref_id: Option<&str>,
        details: Option<serde_json::Value>,
    ) -> Option<String> {
        let log = ActionLog {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: session.username.clone(),
            action_type: action.as_str().to_string(),
            entity: entity.to_string(),
            ref_id: ref_id.map(str::to_string),
            detail: details.map(|v| v.to_string()),
        };

        match self.action_log_repo.insert(&log) {
            Ok(action_id) => Some(action_id),
            Err(e) => {
                tracing::warn!(
                    actor = %log.actor,
                    action = %action,
                    entity,
                    error = %e,
                    "操作日志追加失败"
                );
                None
            }
        }
    }

    pub fn recent(&self, limit: i32) -> EngineResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_recent(limit)?)
    }

    pub fn by_actor(&self, actor: &str, limit: i32) -> EngineResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_actor(actor, limit)?)
    }

    pub fn by_entity(&self, entity: &str, ref_id: &str) -> EngineResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_entity(entity, ref_id)?)
    }
}
