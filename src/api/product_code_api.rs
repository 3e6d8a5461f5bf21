// ==========================================
// 库存成本核算系统 - 商品编码 API
// ==========================================
// 职责: 编码映射分配、商品编号生成、映射查询
// 审计: 分配与生成均追加操作日志
// ==========================================

use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::domain::action_log::ActionType;
use crate::domain::product_code::ProductCodeMapping;
use crate::domain::types::Session;
use crate::engine::{AccessGuard, ProductCodeRegistry};

const ENTITY_PRODUCT_CODE: &str = "product_code";

pub struct ProductCodeApi {
    registry: Arc<ProductCodeRegistry>,
    guard: Arc<AccessGuard>,
}

impl ProductCodeApi {
    pub fn new(registry: Arc<ProductCodeRegistry>, guard: Arc<AccessGuard>) -> Self {
        Self { registry, guard }
    }

    /// 分配编码映射；next_serial 缺省为 1
    pub fn assign_mapping(
        &self,
        session: &Session,
        category: &str,
        subcategory: &str,
        cat_code: &str,
        sub_code: &str,
        next_serial: Option<i64>,
    ) -> ApiResult<ProductCodeMapping> {
        let mapping = self.registry.assign_mapping(
            category,
            subcategory,
            cat_code,
            sub_code,
            next_serial.unwrap_or(1),
        )?;

        self.guard.record(
            session,
            ActionType::AssignProductCode,
            ENTITY_PRODUCT_CODE,
            mapping.id.map(|id| id.to_string()).as_deref(),
            Some(serde_json::json!({
                "category": mapping.category,
                "subcategory": mapping.subcategory,
                "cat_code": mapping.cat_code,
                "sub_code": mapping.sub_code,
                "next_serial": mapping.next_serial,
            })),
        );

        Ok(mapping)
    }

    /// 生成 count 个商品编号；year 缺省为当前年份
    pub fn generate_ids(
        &self,
        session: &Session,
        category: &str,
        subcategory: &str,
        count: i64,
        year: Option<i32>,
    ) -> ApiResult<Vec<String>> {
        let ids = self
            .registry
            .generate_ids(category, subcategory, count, year)?;

        self.guard.record(
            session,
            ActionType::GenerateProductIds,
            ENTITY_PRODUCT_CODE,
            None,
            Some(serde_json::json!({
                "category": category.trim(),
                "subcategory": subcategory.trim(),
                "count": count,
                "first": ids.first(),
                "last": ids.last(),
            })),
        );

        Ok(ids)
    }

    pub fn list_mappings(&self) -> ApiResult<Vec<ProductCodeMapping>> {
        Ok(self.registry.list_mappings()?)
    }

    pub fn get_mapping(
        &self,
        category: &str,
        subcategory: &str,
    ) -> ApiResult<Option<ProductCodeMapping>> {
        Ok(self.registry.find_mapping(category, subcategory)?)
    }
}
