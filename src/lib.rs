// ==========================================
// 考试配置版本管理引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 进程内数据引擎 (版本化属性-值配置存储)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AttributeType, DraftState, NodeStatus};

// 领域实体
pub use domain::{
    Configuration, ConfigurationAttribute, ConfigurationNode, ConfigurationValue,
    ExamConfigurationMap, ExamTemplate, NewAttribute, NewNode, NewTemplate,
    OrientationPlacement,
};

// 引擎
pub use engine::{
    AttributeCatalog, CatalogHandle, ConfigurationService, EngineError, EngineResult,
    SchemaErrorKind, TemplateResolver, ValidationEngine, ValidationFailure, ValidationKind,
    VersionManager,
};

// 仓储错误
pub use repository::{RepositoryError, RepositoryResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "考试配置版本管理引擎";

// ==========================================
// 预编译检查
// ==========================================
