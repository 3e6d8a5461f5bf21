// ==========================================
// 假汇率源
// ==========================================
// 职责: 按币种对返回固定汇率，统计调用次数，可随时切换为失败
// ==========================================

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use stock_costing::engine::{FxError, RateSource};

#[derive(Default)]
pub struct MockRateSource {
    rates: Mutex<HashMap<(String, String), f64>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 1 单位 from 兑换 to 的汇率
    pub fn set_rate(&self, from_ccy: &str, to_ccy: &str, rate: f64) {
        self.rates
            .lock()
            .unwrap()
            .insert((from_ccy.to_string(), to_ccy.to_string()), rate);
    }

    /// 模拟网络中断
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    async fn fetch_rate(
        &self,
        _date: Option<NaiveDate>,
        from_ccy: &str,
        to_ccy: &str,
    ) -> Result<f64, FxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FxError::Transport("mock network down".to_string()));
        }
        self.rates
            .lock()
            .unwrap()
            .get(&(from_ccy.to_string(), to_ccy.to_string()))
            .copied()
            .ok_or_else(|| FxError::MissingRate(to_ccy.to_string()))
    }
}
