// ==========================================
// 库存成本核算系统 - 领域类型定义
// ==========================================
// 职责: 币种金额、会话上下文等跨模块值对象
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 管理员角色（删除类操作需要）
pub const ROLE_ADMIN: &str = "admin";

/// 普通操作员角色
pub const ROLE_OPERATOR: &str = "operator";

/// 规范化币种代码（去空白 + 大写）
pub fn normalize_currency(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// ==========================================
// CurrencyAmount - 带币种的金额
// ==========================================
// 不单独持久化，只在汇率解析与台账调用之间传递
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub value: f64,
    pub currency: String,
}

impl CurrencyAmount {
    pub fn new(value: f64, currency: &str) -> Self {
        Self {
            value,
            currency: normalize_currency(currency),
        }
    }

    /// 是否与给定币种相同（忽略大小写）
    pub fn is_in(&self, currency: &str) -> bool {
        self.currency == normalize_currency(currency)
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.currency)
    }
}

// ==========================================
// Session - 会话上下文
// ==========================================
// 显式传入每一次写操作与权限校验，替代进程级“当前用户”
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: String,
}

impl Session {
    pub fn new(username: &str, role: &str) -> Self {
        Self {
            username: username.to_string(),
            role: role.to_string(),
        }
    }

    /// 角色比较（忽略大小写）
    pub fn has_role(&self, role: &str) -> bool {
        self.role.trim().eq_ignore_ascii_case(role.trim())
    }
}

// ==========================================
// ItemKey - 品类/子品类 组合键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub category: String,
    pub subcategory: String,
}

impl ItemKey {
    pub fn new(category: &str, subcategory: &str) -> Self {
        Self {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.subcategory)
    }
}
