// ==========================================
// 库存成本核算系统 - 系统设置与审计查询 API
// ==========================================
// 职责: settings 读写（币种、汇率接口）、操作日志查询
// 校验: 币种键的值规范化为大写 3 位字母代码
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::{normalize_currency, Session};
use crate::engine::AccessGuard;

const CURRENCY_KEYS: [&str; 4] = [
    config_keys::BASE_CURRENCY,
    config_keys::DEFAULT_IMPORT_CURRENCY,
    config_keys::DEFAULT_SALE_CURRENCY,
    config_keys::DEFAULT_EXPENSE_CURRENCY,
];

pub struct SettingsApi {
    config: Arc<ConfigManager>,
    guard: Arc<AccessGuard>,
}

impl SettingsApi {
    pub fn new(config: Arc<ConfigManager>, guard: Arc<AccessGuard>) -> Self {
        Self { config, guard }
    }

    pub fn list_settings(&self) -> ApiResult<BTreeMap<String, String>> {
        Ok(self.config.list_all()?)
    }

    pub fn get_setting(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.config.get_value(key)?)
    }

    pub fn base_currency(&self) -> ApiResult<String> {
        Ok(self.config.base_currency()?)
    }

    /// 写入设置
    ///
    /// # 返回
    /// - Err(InvalidInput): 键为空、币种值不是 3 位字母、超时不是正整数
    pub fn update_setting(&self, session: &Session, key: &str, value: &str) -> ApiResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ApiError::InvalidInput("配置键不能为空".to_string()));
        }

        let value = normalize_setting(key, value)?;
        let previous = self.config.get_value(key)?;
        self.config.set_value(key, &value)?;

        tracing::info!(key, value = %value, "设置已更新");
        self.guard.record(
            session,
            ActionType::UpdateSetting,
            "setting",
            Some(key),
            Some(serde_json::json!({ "old": previous, "new": value })),
        );
        Ok(())
    }

    // ==========================================
    // 操作日志查询
    // ==========================================

    pub fn recent_actions(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.guard.recent(limit)?)
    }

    pub fn actions_by_actor(&self, actor: &str, limit: i32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.guard.by_actor(actor, limit)?)
    }

    pub fn actions_for_entity(&self, entity: &str, ref_id: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self.guard.by_entity(entity, ref_id)?)
    }
}

fn normalize_setting(key: &str, value: &str) -> ApiResult<String> {
    if CURRENCY_KEYS.contains(&key) {
        let code = normalize_currency(value);
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::InvalidInput(format!("币种代码无效: {}", value)));
        }
        return Ok(code);
    }

    if key == config_keys::FX_TIMEOUT_SECS {
        let secs = value.trim().parse::<u64>().ok().filter(|s| *s > 0);
        return match secs {
            Some(s) => Ok(s.to_string()),
            None => Err(ApiError::InvalidInput(format!("超时秒数无效: {}", value))),
        };
    }

    Ok(value.trim().to_string())
}
