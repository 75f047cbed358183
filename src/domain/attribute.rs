// ==========================================
// 考试配置版本管理引擎 - 配置属性实体
// ==========================================
// resources / dependencies 为序列化 JSON 字符串数组列,
// 格式合法性在目录装载时校验 (见 engine::catalog)
// ==========================================

use crate::domain::types::AttributeType;
use serde::{Deserialize, Serialize};

/// 配置属性定义 (模式层)
///
/// parent_id 构成属性树: TABLE/COMPOSITE 容器的子属性通过 parent_id 挂载,
/// 容器自身不持值, 叶子子属性各自落行 (共享 list_index)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationAttribute {
    pub id: i64,
    pub name: String,
    pub attribute_type: AttributeType,
    pub parent_id: Option<i64>,
    /// 选项列表 (JSON 字符串数组), 仅 SINGLE_SELECTION/MULTI_SELECTION 使用
    pub resources: Option<String>,
    /// 命名校验规则, 必须在校验器注册表中存在
    pub validator: Option<String>,
    /// 依赖属性名列表 (JSON 字符串数组)
    pub dependencies: Option<String>,
    pub default_value: Option<String>,
}

impl ConfigurationAttribute {
    /// 解码 resources 列 (目录装载后调用是安全的, 装载时已校验格式)
    pub fn resource_list(&self) -> Vec<String> {
        self.resources
            .as_deref()
            .map(|raw| serde_json::from_str(raw).unwrap_or_default())
            .unwrap_or_default()
    }

    /// 解码 dependencies 列
    pub fn dependency_list(&self) -> Vec<String> {
        self.dependencies
            .as_deref()
            .map(|raw| serde_json::from_str(raw).unwrap_or_default())
            .unwrap_or_default()
    }
}

/// 新建属性的输入 (id 由数据库分配)
#[derive(Debug, Clone, Default)]
pub struct NewAttribute {
    pub name: String,
    pub attribute_type: Option<AttributeType>,
    pub parent_id: Option<i64>,
    pub resources: Option<String>,
    pub validator: Option<String>,
    pub dependencies: Option<String>,
    pub default_value: Option<String>,
}

impl NewAttribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type: Some(attribute_type),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    /// 以 JSON 字符串数组形式写入选项列表
    pub fn with_resources(mut self, resources: &[&str]) -> Self {
        self.resources = serde_json::to_string(resources).ok();
        self
    }

    /// 以 JSON 字符串数组形式写入依赖属性名
    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = serde_json::to_string(dependencies).ok();
        self
    }
}
