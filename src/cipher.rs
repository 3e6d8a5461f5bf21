// ==========================================
// 库存成本核算系统 - 静态文本加密接口
// ==========================================
// 职责: 供应商/备注等自由文本落库前加密、读取后解密
// 说明: 具体算法由外部提供，默认实现为明文（不做变换）
// ==========================================

use std::sync::Arc;

/// 文本加密器
pub trait TextCipher: Send + Sync {
    /// 明文 → 存储令牌
    fn encrypt(&self, text: &str) -> String;

    /// 存储令牌 → 明文
    fn decrypt(&self, token: &str) -> String;
}

/// 明文实现（no-op）
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextCipher;

impl TextCipher for PlainTextCipher {
    fn encrypt(&self, text: &str) -> String {
        text.to_string()
    }

    fn decrypt(&self, token: &str) -> String {
        token.to_string()
    }
}

/// 默认加密器
pub fn default_cipher() -> Arc<dyn TextCipher> {
    Arc::new(PlainTextCipher)
}
