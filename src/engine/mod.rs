// ==========================================
// 考试配置版本管理引擎 - 引擎层
// ==========================================
// 读路径: catalog / template_resolver
// 写路径: version_manager 守门, validation 先行
// service 为外部协作方唯一入口
// ==========================================

pub mod catalog;
pub mod error;
pub mod service;
pub mod template_resolver;
pub mod validation;
pub mod version_manager;

pub use catalog::{AttributeCatalog, CatalogHandle};
pub use error::{
    EngineError, EngineResult, SchemaErrorKind, ValidationFailure, ValidationKind,
};
pub use service::{ConfigurationService, ResolvedAttribute, DEFAULT_VIEW};
pub use template_resolver::TemplateResolver;
pub use validation::ValidationEngine;
pub use version_manager::VersionManager;
