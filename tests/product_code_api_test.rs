// ==========================================
// ProductCodeApi 集成测试
// ==========================================
// 测试范围:
// 1. 映射冲突返回违反的规则与冲突值
// 2. 编号连续生成，流水号不重复不跳号
// 3. 未配置映射时生成失败
// ==========================================

mod helpers;

use helpers::api_test_helper::*;
use stock_costing::api::ApiError;
use stock_costing::domain::MappingRule;

#[test]
fn test_cat_code_跨品类复用被拒绝() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let api = &env.state.product_code_api;

    api.assign_mapping(&operator(), "Widgets", "Blue", "001", "002", None)
        .expect("首次分配失败");

    let err = api
        .assign_mapping(&operator(), "Gadgets", "Red", "001", "003", None)
        .unwrap_err();
    match err {
        ApiError::ConflictingMapping {
            rule,
            existing,
            message,
        } => {
            assert_eq!(rule, MappingRule::CatCodeOwnedByOtherCategory);
            assert_eq!(existing, "Widgets");
            assert_eq!(message, "cat_code 001 already used by Widgets");
        }
        other => panic!("应返回 ConflictingMapping, 实际: {:?}", other),
    }

    assert_eq!(api.list_mappings().unwrap().len(), 1);
}

#[test]
fn test_编码自动补零() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let mapping = env
        .state
        .product_code_api
        .assign_mapping(&operator(), "Widgets", "Blue", "1", "22", Some(5))
        .unwrap();

    assert_eq!(mapping.cat_code, "001");
    assert_eq!(mapping.sub_code, "022");
    assert_eq!(mapping.next_serial, 5);
    assert!(mapping.id.is_some());
}

#[test]
fn test_无效编码被拒绝() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let err = env
        .state
        .product_code_api
        .assign_mapping(&operator(), "Widgets", "Blue", "1000", "002", None)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn test_连续生成编号无重复无跳号() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let api = &env.state.product_code_api;
    api.assign_mapping(&operator(), "Widgets", "Blue", "001", "002", None)
        .unwrap();

    let mut ids = api
        .generate_ids(&operator(), "Widgets", "Blue", 5, Some(2024))
        .unwrap();
    ids.extend(
        api.generate_ids(&operator(), "Widgets", "Blue", 3, Some(2024))
            .unwrap(),
    );

    assert_eq!(ids.len(), 8);
    assert!(ids.iter().all(|id| id.len() == 12 && id.starts_with("24001002")));
    let serials: Vec<i64> = ids.iter().map(|id| id[8..].parse().unwrap()).collect();
    assert_eq!(serials, (1..=8).collect::<Vec<i64>>());

    let mapping = api.get_mapping("Widgets", "Blue").unwrap().unwrap();
    assert_eq!(mapping.next_serial, 9);
}

#[test]
fn test_未配置映射时生成失败() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let err = env
        .state
        .product_code_api
        .generate_ids(&operator(), "Widgets", "Blue", 1, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::NoMapping(_)));
}

#[test]
fn test_超大生成数量被拒绝且不影响后续调用() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let api = &env.state.product_code_api;
    api.assign_mapping(&operator(), "Widgets", "Blue", "001", "002", None)
        .unwrap();

    let err = api
        .generate_ids(&operator(), "Widgets", "Blue", i64::MAX, Some(2024))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    // 共享连接仍可用，流水号未被推进
    let ids = api
        .generate_ids(&operator(), "Widgets", "Blue", 2, Some(2024))
        .unwrap();
    assert_eq!(ids, vec!["240010020001", "240010020002"]);
    assert_eq!(env.state.inventory_api.list_imports().unwrap().len(), 0);
}

#[test]
fn test_分配与生成写入审计() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let api = &env.state.product_code_api;
    api.assign_mapping(&operator(), "Widgets", "Blue", "001", "002", None)
        .unwrap();
    api.generate_ids(&operator(), "Widgets", "Blue", 2, Some(2024))
        .unwrap();

    let recent = env.state.settings_api.recent_actions(10).unwrap();
    let types: Vec<&str> = recent.iter().map(|e| e.action_type.as_str()).collect();
    assert!(types.contains(&"ASSIGN_PRODUCT_CODE"));
    assert!(types.contains(&"GENERATE_PRODUCT_IDS"));
}
