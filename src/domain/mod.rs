// ==========================================
// 考试配置版本管理引擎 - 领域层
// ==========================================

pub mod attribute;
pub mod configuration;
pub mod exam_map;
pub mod layout;
pub mod template;
pub mod types;

pub use attribute::{ConfigurationAttribute, NewAttribute};
pub use configuration::{Configuration, ConfigurationNode, ConfigurationValue, NewNode};
pub use exam_map::ExamConfigurationMap;
pub use layout::OrientationPlacement;
pub use template::{ExamTemplate, NewTemplate};
pub use types::{AttributeType, DraftState, NodeStatus};
