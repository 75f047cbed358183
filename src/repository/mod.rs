// ==========================================
// 考试配置版本管理引擎 - 仓储层
// ==========================================
// 全部仓储共享同一个 Arc<Mutex<Connection>>;
// 多行变更 (草稿拷贝 / 左移重编号) 在仓储方法内部以单事务执行
// ==========================================

pub mod attribute_repo;
pub mod configuration_repo;
pub mod error;
pub mod exam_map_repo;
pub mod node_repo;
pub mod orientation_repo;
pub mod template_repo;
pub mod value_repo;

pub use attribute_repo::ConfigurationAttributeRepository;
pub use configuration_repo::ConfigurationRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use exam_map_repo::ExamConfigurationMapRepository;
pub use node_repo::ConfigurationNodeRepository;
pub use orientation_repo::OrientationRepository;
pub use template_repo::ExamTemplateRepository;
pub use value_repo::ConfigurationValueRepository;
