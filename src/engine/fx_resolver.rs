// ==========================================
// 库存成本核算系统 - 汇率解析引擎
// ==========================================
// 解析顺序:
//   1. 币种规范化；相同币种直接返回 1.0（不写缓存）
//   2. fx_cache 命中（正数）直接返回
//   3. USD↔TRY: 先查本地日汇率表，再请求外部源，并双写两处
//   4. 其他币种对: 直接请求外部源
//   5. 任何解析出的正汇率在返回前写入 fx_cache
//   6. 全部失败返回 None（不可用），从不向调用方抛错
// 约束: 不在持有数据库锁时 await
// ==========================================

use crate::domain::types::{normalize_currency, CurrencyAmount};
use crate::engine::rate_source::RateSource;
use crate::repository::fx_rate_repo::FxRateRepository;
use chrono::NaiveDate;
use std::sync::Arc;

const USD: &str = "USD";
const TRY: &str = "TRY";

/// USD/TRY 专用通道的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UsdTryDirection {
    UsdToTry,
    TryToUsd,
}

impl UsdTryDirection {
    fn of(from_ccy: &str, to_ccy: &str) -> Option<Self> {
        match (from_ccy, to_ccy) {
            (USD, TRY) => Some(UsdTryDirection::UsdToTry),
            (TRY, USD) => Some(UsdTryDirection::TryToUsd),
            _ => None,
        }
    }

    /// 本地表存的是 USD→TRY；按方向换算为请求方向的汇率
    fn from_stored(self, usd_try: f64) -> f64 {
        match self {
            UsdTryDirection::UsdToTry => usd_try,
            UsdTryDirection::TryToUsd => 1.0 / usd_try,
        }
    }

    fn to_stored(self, rate: f64) -> f64 {
        match self {
            UsdTryDirection::UsdToTry => rate,
            UsdTryDirection::TryToUsd => 1.0 / rate,
        }
    }
}

// ==========================================
// FxRateResolver - 汇率解析器
// ==========================================
pub struct FxRateResolver {
    repo: Arc<FxRateRepository>,
    source: Arc<dyn RateSource>,
}

impl FxRateResolver {
    pub fn new(repo: Arc<FxRateRepository>, source: Arc<dyn RateSource>) -> Self {
        Self { repo, source }
    }

    /// 解析 date 当日 1 单位 from 可兑换的 to 数量
    ///
    /// # 参数
    /// - date: 估值日期；None 表示最新汇率（缓存键使用当天日期）
    ///
    /// # 返回
    /// - Some(rate): 正汇率
    /// - None: 不可用（缓存/本地表未命中且外部源失败）
    pub async fn resolve(
        &self,
        date: Option<NaiveDate>,
        from_ccy: &str,
        to_ccy: &str,
    ) -> Option<f64> {
        let from = normalize_currency(from_ccy);
        let to = normalize_currency(to_ccy);

        if from == to {
            return Some(1.0);
        }
        if from.is_empty() || to.is_empty() {
            tracing::warn!(from = %from, to = %to, "币种代码为空，汇率不可用");
            return None;
        }

        let key_date = date.unwrap_or_else(|| chrono::Local::now().date_naive());

        // 1) 通用缓存
        match self.repo.get_cached(key_date, &from, &to) {
            Ok(Some(rate)) if rate > 0.0 => {
                tracing::debug!(date = %key_date, from = %from, to = %to, rate, "汇率缓存命中");
                return Some(rate);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(date = %key_date, from = %from, to = %to, error = %e, "读取汇率缓存失败");
            }
        }

        // 2) USD/TRY 本地日汇率
        let usd_try = UsdTryDirection::of(&from, &to);
        if let Some(direction) = usd_try {
            match self.repo.get_local_rate(key_date) {
                Ok(Some(stored)) if stored > 0.0 => {
                    let rate = direction.from_stored(stored);
                    tracing::debug!(date = %key_date, from = %from, to = %to, rate, "USD/TRY 本地汇率命中");
                    self.store_cache(key_date, &from, &to, rate);
                    return Some(rate);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(date = %key_date, error = %e, "读取 USD/TRY 本地汇率失败");
                }
            }
        }

        // 3) 外部汇率源（此时未持有任何数据库锁）
        let rate = match self.source.fetch_rate(date, &from, &to).await {
            Ok(rate) if rate > 0.0 => rate,
            Ok(rate) => {
                tracing::warn!(date = %key_date, from = %from, to = %to, rate, "外部汇率非正数，视为不可用");
                return None;
            }
            Err(e) => {
                tracing::warn!(date = %key_date, from = %from, to = %to, error = %e, "外部汇率获取失败，视为不可用");
                return None;
            }
        };

        if let Some(direction) = usd_try {
            if let Err(e) = self.repo.upsert_local_rate(key_date, direction.to_stored(rate)) {
                tracing::warn!(date = %key_date, error = %e, "写入 USD/TRY 本地汇率失败");
            }
        }
        self.store_cache(key_date, &from, &to, rate);

        tracing::info!(date = %key_date, from = %from, to = %to, rate, "外部汇率已获取");
        Some(rate)
    }

    /// 金额换算：amount × rate；汇率不可用时返回 None
    pub async fn convert(
        &self,
        date: Option<NaiveDate>,
        amount: f64,
        from_ccy: &str,
        to_ccy: &str,
    ) -> Option<f64> {
        let rate = self.resolve(date, from_ccy, to_ccy).await?;
        if rate > 0.0 {
            Some(amount * rate)
        } else {
            None
        }
    }

    /// 带币种金额换算
    pub async fn convert_amount(
        &self,
        date: Option<NaiveDate>,
        amount: &CurrencyAmount,
        to_ccy: &str,
    ) -> Option<CurrencyAmount> {
        let value = self
            .convert(date, amount.value, &amount.currency, to_ccy)
            .await?;
        Some(CurrencyAmount::new(value, to_ccy))
    }

    // 缓存写入失败只记录日志
    fn store_cache(&self, date: NaiveDate, from_ccy: &str, to_ccy: &str, rate: f64) {
        if let Err(e) = self.repo.put_cached(date, from_ccy, to_ccy, rate) {
            tracing::warn!(date = %date, from = %from_ccy, to = %to_ccy, error = %e, "写入汇率缓存失败");
        }
    }
}
