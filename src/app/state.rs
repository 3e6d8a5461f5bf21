// ==========================================
// 库存成本核算系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 启动: 打开数据库 → 统一 PRAGMA → 建表 → 重建库存快照
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{InventoryApi, ProductCodeApi, SalesApi, SettingsApi};
use crate::cipher::{default_cipher, TextCipher};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{
    AccessGuard, BatchLedger, FifoAllocator, FxRateResolver, HttpRateSource, InventoryAggregate,
    ProductCodeRegistry, RateSource,
};
use crate::repository::{
    ActionLogRepository, FxRateRepository, ImportRepository, InventoryRepository,
    ProductCodeRepository, SaleAllocationRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源；所有仓储共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 进货与库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 销售成本核算API
    pub sales_api: Arc<SalesApi>,

    /// 商品编码API
    pub product_code_api: Arc<ProductCodeApi>,

    /// 系统设置API
    pub settings_api: Arc<SettingsApi>,

    /// 汇率解析器（供调用方直接换算金额）
    pub fx_resolver: Arc<FxRateResolver>,
}

impl AppState {
    /// 创建新的AppState实例（汇率源为配置中的 HTTP 接口）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        let conn = open_and_init(&db_path)?;

        let config = ConfigManager::from_connection(conn.clone());
        let host = config
            .fx_api_host()
            .map_err(|e| format!("读取汇率接口配置失败: {}", e))?;
        let timeout = config
            .fx_timeout()
            .map_err(|e| format!("读取汇率超时配置失败: {}", e))?;
        let source = HttpRateSource::new(&host, timeout)
            .map_err(|e| format!("无法创建汇率客户端: {}", e))?;

        Self::assemble(db_path, conn, Arc::new(source), default_cipher())
    }

    /// 使用指定汇率源与加密器创建实例（测试与离线环境）
    pub fn with_components(
        db_path: String,
        source: Arc<dyn RateSource>,
        cipher: Arc<dyn TextCipher>,
    ) -> Result<Self, String> {
        let conn = open_and_init(&db_path)?;
        Self::assemble(db_path, conn, source, cipher)
    }

    fn assemble(
        db_path: String,
        conn: Arc<Mutex<rusqlite::Connection>>,
        source: Arc<dyn RateSource>,
        cipher: Arc<dyn TextCipher>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let import_repo = Arc::new(ImportRepository::new(conn.clone(), cipher));
        let allocation_repo = Arc::new(SaleAllocationRepository::new(conn.clone()));
        let fx_rate_repo = Arc::new(FxRateRepository::new(conn.clone()));
        let inventory_repo = Arc::new(InventoryRepository::new(conn.clone()));
        let product_code_repo = Arc::new(ProductCodeRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let fx_resolver = Arc::new(FxRateResolver::new(fx_rate_repo, source));
        let ledger = Arc::new(BatchLedger::new(
            import_repo.clone(),
            fx_resolver.clone(),
            config.clone(),
        ));
        let allocator = Arc::new(FifoAllocator::new(allocation_repo.clone()));
        let registry = Arc::new(ProductCodeRegistry::new(product_code_repo));
        let aggregate = Arc::new(InventoryAggregate::new(inventory_repo));
        let guard = Arc::new(AccessGuard::new(action_log_repo));

        // 启动时以 imports 为准重建一次快照，消除上次运行遗留的偏差
        let rows = aggregate
            .rebuild()
            .map_err(|e| format!("库存快照重建失败: {}", e))?;
        tracing::info!(rows, "启动时库存快照已重建");

        // ==========================================
        // 创建API实例
        // ==========================================
        let inventory_api = Arc::new(InventoryApi::new(
            import_repo,
            ledger,
            aggregate,
            guard.clone(),
        ));
        let sales_api = Arc::new(SalesApi::new(
            allocator,
            allocation_repo,
            fx_resolver.clone(),
            config.clone(),
            guard.clone(),
        ));
        let product_code_api = Arc::new(ProductCodeApi::new(registry, guard.clone()));
        let settings_api = Arc::new(SettingsApi::new(config, guard));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            inventory_api,
            sales_api,
            product_code_api,
            settings_api,
            fx_resolver,
        })
    }
}

// 打开共享连接并确保表结构存在
fn open_and_init(db_path: &str) -> Result<Arc<Mutex<rusqlite::Connection>>, String> {
    let conn = open_sqlite_connection(db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
    init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 STOCK_COSTING_DB_PATH，否则放在用户数据目录下
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("STOCK_COSTING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./stock_costing.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("stock-costing-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("stock-costing");
        }

        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&path).is_ok() {
            path = path.join("stock_costing.db");
        } else {
            path = PathBuf::from("./stock_costing.db");
        }
    }

    path.to_string_lossy().to_string()
}
