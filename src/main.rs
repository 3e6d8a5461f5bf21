// ==========================================
// 库存成本核算系统 - 主入口
// ==========================================
// 行为: 打开默认数据库（启动时重建库存快照），输出库存与估值摘要，
//       以及各进货币种对本位币的最新汇率
// ==========================================

use anyhow::anyhow;
use std::collections::BTreeSet;
use stock_costing::app::{get_default_db_path, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    stock_costing::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", stock_costing::APP_NAME);
    tracing::info!("系统版本: {}", stock_costing::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!("无法初始化AppState: {}", e))?;

    let base = state.settings_api.base_currency()?;
    let snapshots = state.inventory_api.list_inventory()?;
    let valuation = state.inventory_api.stock_valuation()?;

    println!("品类/子品类\t累计进货\t可售数量\t估值({})", base);
    for snapshot in &snapshots {
        let (remaining, value) = valuation
            .iter()
            .find(|v| v.category == snapshot.category && v.subcategory == snapshot.subcategory)
            .map(|v| (v.remaining_quantity, v.value_base))
            .unwrap_or((0, 0.0));
        println!(
            "{}/{}\t{}\t{}\t{:.2}",
            snapshot.category, snapshot.subcategory, snapshot.quantity, remaining, value
        );
    }

    let total: f64 = valuation.iter().map(|v| v.value_base).sum();
    println!("合计估值: {:.2} {}", total, base);

    let currencies: BTreeSet<String> = state
        .inventory_api
        .list_imports()?
        .into_iter()
        .map(|r| r.currency)
        .filter(|c| *c != base)
        .collect();
    for currency in &currencies {
        match state.fx_resolver.resolve(None, currency, &base).await {
            Some(rate) => println!("最新汇率 {}/{}: {:.4}", currency, base, rate),
            None => println!("最新汇率 {}/{}: 不可用", currency, base),
        }
    }
    Ok(())
}
