// ==========================================
// SettingsApi 集成测试
// ==========================================
// 测试范围:
// 1. 默认币种配置
// 2. 更新设置（规范化、校验、审计）
// 3. 本位币变更影响后续进货估值
// ==========================================

mod helpers;

use helpers::api_test_helper::*;
use stock_costing::api::ApiError;
use stock_costing::config::config_keys;

#[test]
fn test_默认本位币() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    assert_eq!(env.state.settings_api.base_currency().unwrap(), "TRY");
    assert!(env.state.settings_api.list_settings().unwrap().is_empty());
}

#[test]
fn test_更新币种设置() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let api = &env.state.settings_api;

    api.update_setting(&admin(), config_keys::DEFAULT_SALE_CURRENCY, " eur ")
        .unwrap();
    assert_eq!(
        api.get_setting(config_keys::DEFAULT_SALE_CURRENCY).unwrap().as_deref(),
        Some("EUR")
    );

    let err = api
        .update_setting(&admin(), config_keys::BASE_CURRENCY, "euro")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let entries = api
        .actions_for_entity("setting", config_keys::DEFAULT_SALE_CURRENCY)
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, "UPDATE_SETTING");
}

#[tokio::test]
async fn test_本位币变更后按新本位币估值() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.source.set_rate("TRY", "USD", 0.04);

    env.state
        .settings_api
        .update_setting(&admin(), config_keys::BASE_CURRENCY, "USD")
        .unwrap();

    let (_, batch) = env
        .state
        .inventory_api
        .add_import(&operator(), new_import(date(2024, 1, 1), "Widgets", "Blue", 1, 100.0, "TRY"))
        .await
        .unwrap();
    assert!((batch.unit_cost_base - 4.0).abs() < 1e-9);

    // 空币种使用默认进货币种（USD），等于本位币
    let (record, batch) = env
        .state
        .inventory_api
        .add_import(&operator(), new_import(date(2024, 1, 1), "Widgets", "Blue", 1, 3.0, ""))
        .await
        .unwrap();
    assert_eq!(record.currency, "USD");
    assert_eq!(batch.unit_cost_base, 3.0);
}
