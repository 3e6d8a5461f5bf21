// ==========================================
// 库存成本核算系统 - 外部汇率源
// ==========================================
// 接口: GET /latest?from=CCY&to=CCY 或 /{YYYY-MM-DD}?from=CCY&to=CCY
// 响应: { "rates": { "<CCY>": <number> } }
// 约束: 先 https 后 http；请求有超时上限；任何失败都以 FxError 返回，由解析器降级
// ==========================================

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 汇率源错误（只在解析器内部流转，不向调用方传播）
#[derive(Error, Debug)]
pub enum FxError {
    #[error("汇率请求失败: {0}")]
    Transport(String),

    #[error("汇率接口返回非 200 状态: {0}")]
    HttpStatus(u16),

    #[error("汇率响应解析失败: {0}")]
    Parse(String),

    #[error("汇率响应缺少币种: {0}")]
    MissingRate(String),

    #[error("汇率非正数: {0}")]
    NonPositiveRate(f64),
}

// ==========================================
// RateSource - 汇率源接口
// ==========================================
#[async_trait]
pub trait RateSource: Send + Sync {
    /// 查询 1 单位 from 可兑换的 to 数量；date 为 None 时取最新
    async fn fetch_rate(
        &self,
        date: Option<NaiveDate>,
        from_ccy: &str,
        to_ccy: &str,
    ) -> Result<f64, FxError>;
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// 请求路径（含查询串）
pub fn rate_path(date: Option<NaiveDate>, from_ccy: &str, to_ccy: &str) -> String {
    let segment = match date {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => "latest".to_string(),
    };
    format!("/{}?from={}&to={}", segment, from_ccy, to_ccy)
}

/// 从响应体中取出目标币种汇率
fn extract_rate(body: &RatesResponse, to_ccy: &str) -> Result<f64, FxError> {
    let rate = body
        .rates
        .get(to_ccy)
        .copied()
        .ok_or_else(|| FxError::MissingRate(to_ccy.to_string()))?;
    if !(rate > 0.0) {
        return Err(FxError::NonPositiveRate(rate));
    }
    Ok(rate)
}

// ==========================================
// HttpRateSource - 基于 reqwest 的汇率源
// ==========================================
pub struct HttpRateSource {
    client: reqwest::Client,
    host: String,
}

impl HttpRateSource {
    /// 创建汇率源
    ///
    /// # 参数
    /// - host: 主机名（不含协议），如 api.frankfurter.app
    /// - timeout: 单次请求超时
    pub fn new(host: &str, timeout: Duration) -> Result<Self, FxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            host: host.trim().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_with_scheme(&self, scheme: &str, path: &str, to_ccy: &str) -> Result<f64, FxError> {
        let url = format!("{}://{}{}", scheme, self.host, path);

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FxError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            return Err(FxError::HttpStatus(res.status().as_u16()));
        }

        let body = res
            .json::<RatesResponse>()
            .await
            .map_err(|e| FxError::Parse(e.to_string()))?;

        extract_rate(&body, to_ccy)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(
        &self,
        date: Option<NaiveDate>,
        from_ccy: &str,
        to_ccy: &str,
    ) -> Result<f64, FxError> {
        let path = rate_path(date, from_ccy, to_ccy);

        match self.fetch_with_scheme("https", &path, to_ccy).await {
            Ok(rate) => Ok(rate),
            Err(e) => {
                tracing::warn!(host = %self.host, path = %path, error = %e, "https 汇率请求失败，改用 http 重试");
                self.fetch_with_scheme("http", &path, to_ccy).await
            }
        }
    }
}
