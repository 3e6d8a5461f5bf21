// ==========================================
// 库存成本核算系统 - 商品编码注册引擎
// ==========================================
// 职责: 维护 (品类, 子品类) ↔ (cat_code, sub_code) 双向唯一映射，生成商品编号
// 红线: 四条映射规则在写入前显式校验（数据库唯一约束仅为兜底）
// 红线: 流水号只增不减，生成与推进在同一事务内完成
// 编号: YY + cat_code(3) + sub_code(3) + serial(4)
// ==========================================

use crate::domain::product_code::{
    MappingConflict, MappingRule, ProductCodeMapping, CAT_CODE_WIDTH, MAX_SERIAL, SERIAL_WIDTH,
    SUB_CODE_WIDTH,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::product_code_repo::{ProductCodeRepository, SerialReservation};
use chrono::Datelike;
use std::sync::Arc;

/// 规范化数字编码：去空白，只允许数字，长度不超过 width，左侧补零
pub fn normalize_code(field: &str, raw: &str, width: usize) -> EngineResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() > width
        || !trimmed.chars().all(|c| c.is_ascii_digit())
    {
        return Err(EngineError::InvalidCode {
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(format!("{:0>width$}", trimmed, width = width))
}

/// 校验候选映射是否违反四条双向唯一规则
///
/// 与候选同一 (品类, 子品类) 的既有行视为“被更新的行”，不参与自比较。
pub fn validate_mapping(
    existing: &[ProductCodeMapping],
    candidate: &ProductCodeMapping,
) -> Result<(), MappingConflict> {
    let is_self = |m: &ProductCodeMapping| {
        m.category == candidate.category && m.subcategory == candidate.subcategory
    };

    for m in existing.iter().filter(|m| !is_self(m)) {
        // 1) cat_code 只属于一个品类
        if m.cat_code == candidate.cat_code && m.category != candidate.category {
            return Err(MappingConflict {
                rule: MappingRule::CatCodeOwnedByOtherCategory,
                existing: m.category.clone(),
                message: format!("cat_code {} already used by {}", candidate.cat_code, m.category),
            });
        }

        // 2) 品类只对应一个 cat_code
        if m.category == candidate.category && m.cat_code != candidate.cat_code {
            return Err(MappingConflict {
                rule: MappingRule::CategoryHasOtherCatCode,
                existing: m.cat_code.clone(),
                message: format!(
                    "category {} already mapped to cat_code {}",
                    candidate.category, m.cat_code
                ),
            });
        }

        // 3) 同一品类内 sub_code 只属于一个子品类
        if m.category == candidate.category
            && m.sub_code == candidate.sub_code
            && m.subcategory != candidate.subcategory
        {
            return Err(MappingConflict {
                rule: MappingRule::SubCodeOwnedByOtherSubcategory,
                existing: m.subcategory.clone(),
                message: format!(
                    "sub_code {} already used by {}/{}",
                    candidate.sub_code, m.category, m.subcategory
                ),
            });
        }
    }

    // 4) (品类, 子品类) 只对应一个 sub_code：已有映射时不可改 sub_code
    if let Some(current) = existing.iter().find(|m| is_self(m)) {
        if current.sub_code != candidate.sub_code {
            return Err(MappingConflict {
                rule: MappingRule::PairHasOtherSubCode,
                existing: current.sub_code.clone(),
                message: format!(
                    "{}/{} already mapped to sub_code {}",
                    candidate.category, candidate.subcategory, current.sub_code
                ),
            });
        }
    }

    Ok(())
}

/// 拼装商品编号
pub fn format_product_id(year: i32, cat_code: &str, sub_code: &str, serial: i64) -> String {
    format!(
        "{:02}{}{}{:0>width$}",
        year.rem_euclid(100),
        cat_code,
        sub_code,
        serial,
        width = SERIAL_WIDTH
    )
}

// ==========================================
// ProductCodeRegistry - 商品编码注册器
// ==========================================
pub struct ProductCodeRegistry {
    repo: Arc<ProductCodeRepository>,
}

impl ProductCodeRegistry {
    pub fn new(repo: Arc<ProductCodeRepository>) -> Self {
        Self { repo }
    }

    /// 分配（新建或更新）编码映射
    ///
    /// # 参数
    /// - next_serial: 起始流水号；更新时只会取较大值
    ///
    /// # 返回
    /// - Err(ConflictingMapping): 违反某条规则，携带规则与冲突的既有值
    /// - Err(InvalidCode): 编码不是不超过固定宽度的数字
    pub fn assign_mapping(
        &self,
        category: &str,
        subcategory: &str,
        cat_code: &str,
        sub_code: &str,
        next_serial: i64,
    ) -> EngineResult<ProductCodeMapping> {
        let category = category.trim();
        let subcategory = subcategory.trim();
        if category.is_empty() || subcategory.is_empty() {
            return Err(EngineError::InvalidInput("品类与子品类不能为空".to_string()));
        }
        if next_serial < 1 || next_serial > MAX_SERIAL {
            return Err(EngineError::InvalidInput(format!(
                "起始流水号超出范围 1..={}: {}",
                MAX_SERIAL, next_serial
            )));
        }

        let candidate = ProductCodeMapping {
            id: None,
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            cat_code: normalize_code("cat_code", cat_code, CAT_CODE_WIDTH)?,
            sub_code: normalize_code("sub_code", sub_code, SUB_CODE_WIDTH)?,
            next_serial,
        };

        let existing = self.repo.list_all()?;
        if let Err(conflict) = validate_mapping(&existing, &candidate) {
            tracing::warn!(
                category = %candidate.category,
                subcategory = %candidate.subcategory,
                rule = %conflict.rule,
                existing = %conflict.existing,
                "编码映射被拒绝"
            );
            return Err(EngineError::ConflictingMapping(conflict));
        }

        let stored = self.repo.upsert(&candidate)?;
        tracing::info!(
            category = %stored.category,
            subcategory = %stored.subcategory,
            cat_code = %stored.cat_code,
            sub_code = %stored.sub_code,
            next_serial = stored.next_serial,
            "编码映射已保存"
        );
        Ok(stored)
    }

    /// 生成 count 个连续商品编号并推进 next_serial
    ///
    /// # 参数
    /// - year: 编号年份；None 表示当前年份
    pub fn generate_ids(
        &self,
        category: &str,
        subcategory: &str,
        count: i64,
        year: Option<i32>,
    ) -> EngineResult<Vec<String>> {
        if count <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "生成数量必须为正数: {}",
                count
            )));
        }
        if count > MAX_SERIAL {
            return Err(EngineError::InvalidInput(format!(
                "生成数量超出流水号上限 {}: {}",
                MAX_SERIAL, count
            )));
        }
        let category = category.trim();
        let subcategory = subcategory.trim();
        let year = year.unwrap_or_else(|| chrono::Local::now().year());

        match self
            .repo
            .reserve_serials(category, subcategory, count, MAX_SERIAL)?
        {
            SerialReservation::Reserved {
                mapping,
                first_serial,
            } => {
                let ids: Vec<String> = (first_serial..first_serial + count)
                    .map(|serial| {
                        format_product_id(year, &mapping.cat_code, &mapping.sub_code, serial)
                    })
                    .collect();
                tracing::info!(
                    category,
                    subcategory,
                    count,
                    first_serial,
                    "商品编号已生成"
                );
                Ok(ids)
            }
            SerialReservation::NoMapping => Err(EngineError::NoMapping {
                category: category.to_string(),
                subcategory: subcategory.to_string(),
            }),
            SerialReservation::Exhausted { next_serial } => Err(EngineError::SerialExhausted {
                category: category.to_string(),
                subcategory: subcategory.to_string(),
                next_serial,
                requested: count,
            }),
        }
    }

    pub fn list_mappings(&self) -> EngineResult<Vec<ProductCodeMapping>> {
        Ok(self.repo.list_all()?)
    }

    pub fn find_mapping(
        &self,
        category: &str,
        subcategory: &str,
    ) -> EngineResult<Option<ProductCodeMapping>> {
        Ok(self.repo.find_by_pair(category.trim(), subcategory.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup() -> ProductCodeRegistry {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ProductCodeRegistry::new(Arc::new(ProductCodeRepository::new(Arc::new(Mutex::new(
            conn,
        )))))
    }

    fn conflict_of(err: EngineError) -> MappingConflict {
        match err {
            EngineError::ConflictingMapping(c) => c,
            other => panic!("expected ConflictingMapping, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("cat_code", "1", 3).unwrap(), "001");
        assert_eq!(normalize_code("cat_code", " 042 ", 3).unwrap(), "042");
        assert!(normalize_code("cat_code", "1234", 3).is_err());
        assert!(normalize_code("cat_code", "1a", 3).is_err());
        assert!(normalize_code("cat_code", "", 3).is_err());
    }

    #[test]
    fn test_format_product_id() {
        assert_eq!(format_product_id(2024, "001", "002", 7), "240010020007");
        assert_eq!(format_product_id(2005, "010", "100", 9999), "050101009999");
    }

    #[test]
    fn test_cat_code_reuse_across_categories_rejected() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();

        let err = registry
            .assign_mapping("Gadgets", "Red", "001", "003", 1)
            .unwrap_err();
        let conflict = conflict_of(err);
        assert_eq!(conflict.rule, MappingRule::CatCodeOwnedByOtherCategory);
        assert_eq!(conflict.existing, "Widgets");
        assert_eq!(conflict.message, "cat_code 001 already used by Widgets");
    }

    #[test]
    fn test_category_cat_code_change_rejected_on_insert_and_update() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();

        // 插入新子品类时换 cat_code
        let err = registry
            .assign_mapping("Widgets", "Green", "005", "003", 1)
            .unwrap_err();
        assert_eq!(conflict_of(err).rule, MappingRule::CategoryHasOtherCatCode);

        // 第二个子品类存在后，更新第一个的 cat_code 仍被拒绝
        registry.assign_mapping("Widgets", "Green", "001", "003", 1).unwrap();
        let err = registry
            .assign_mapping("Widgets", "Blue", "005", "002", 1)
            .unwrap_err();
        assert_eq!(conflict_of(err).rule, MappingRule::CategoryHasOtherCatCode);
    }

    #[test]
    fn test_cat_code_reuse_rejected_on_update() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();
        registry.assign_mapping("Gadgets", "Red", "004", "003", 1).unwrap();

        let err = registry
            .assign_mapping("Gadgets", "Red", "001", "003", 1)
            .unwrap_err();
        let conflict = conflict_of(err);
        assert_eq!(conflict.rule, MappingRule::CatCodeOwnedByOtherCategory);
        assert_eq!(conflict.existing, "Widgets");
    }

    #[test]
    fn test_sub_code_rules() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();

        let err = registry
            .assign_mapping("Widgets", "Green", "001", "002", 1)
            .unwrap_err();
        assert_eq!(conflict_of(err).rule, MappingRule::SubCodeOwnedByOtherSubcategory);

        let err = registry
            .assign_mapping("Widgets", "Blue", "001", "009", 1)
            .unwrap_err();
        assert_eq!(conflict_of(err).rule, MappingRule::PairHasOtherSubCode);

        // 不同品类可复用同一 sub_code
        registry.assign_mapping("Gadgets", "Blue", "004", "002", 1).unwrap();
    }

    #[test]
    fn test_reassign_same_mapping_is_allowed() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "1", "2", 1).unwrap();
        let stored = registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();
        assert_eq!(stored.cat_code, "001");
        assert_eq!(registry.list_mappings().unwrap().len(), 1);
    }

    #[test]
    fn test_generate_ids_consecutive_without_gaps() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();

        let first = registry.generate_ids("Widgets", "Blue", 5, Some(2024)).unwrap();
        let second = registry.generate_ids("Widgets", "Blue", 3, Some(2024)).unwrap();
        assert_eq!(first[0], "240010020001");
        assert_eq!(second[2], "240010020008");

        let serials: Vec<i64> = first
            .iter()
            .chain(second.iter())
            .map(|id| id[8..].parse().unwrap())
            .collect();
        assert_eq!(serials, (1..=8).collect::<Vec<_>>());

        let mapping = registry.find_mapping("Widgets", "Blue").unwrap().unwrap();
        assert_eq!(mapping.next_serial, 9);
    }

    #[test]
    fn test_generate_ids_rejects_count_above_serial_range() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();

        let err = registry
            .generate_ids("Widgets", "Blue", i64::MAX, Some(2024))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let ids = registry.generate_ids("Widgets", "Blue", 1, Some(2024)).unwrap();
        assert_eq!(ids, vec!["240010020001".to_string()]);
    }

    #[test]
    fn test_generate_ids_requires_mapping() {
        let registry = setup();
        let err = registry.generate_ids("Widgets", "Blue", 1, None).unwrap_err();
        assert!(matches!(err, EngineError::NoMapping { .. }));
    }

    #[test]
    fn test_generate_ids_serial_exhausted() {
        let registry = setup();
        registry
            .assign_mapping("Widgets", "Blue", "001", "002", MAX_SERIAL - 1)
            .unwrap();

        let err = registry.generate_ids("Widgets", "Blue", 3, Some(2024)).unwrap_err();
        assert!(matches!(err, EngineError::SerialExhausted { next_serial, .. } if next_serial == MAX_SERIAL - 1));

        let ids = registry.generate_ids("Widgets", "Blue", 2, Some(2024)).unwrap();
        assert_eq!(ids, vec!["240010029998", "240010029999"]);
    }

    #[test]
    fn test_next_serial_never_decreases() {
        let registry = setup();
        registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();
        registry.generate_ids("Widgets", "Blue", 4, Some(2024)).unwrap();

        let stored = registry.assign_mapping("Widgets", "Blue", "001", "002", 1).unwrap();
        assert_eq!(stored.next_serial, 5);
    }
}
