// ==========================================
// 考试配置版本管理引擎 - 配置文档实体
// ==========================================
// ConfigurationNode 拥有其版本序列 (一对多, 按 version_date 排序);
// 每个 Configuration 版本独占其 ConfigurationValue 行 (提交即拷贝语义)
// ==========================================

use crate::domain::types::NodeStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 配置文档标识 (节点)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationNode {
    pub id: i64,
    pub institution_id: i64,
    /// 引用 ExamTemplate, 提供继承默认值
    pub template_id: Option<i64>,
    pub owner: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub node_type: Option<String>,
    pub status: NodeStatus,
    pub last_update_time: NaiveDateTime,
    pub last_update_user: Option<String>,
}

/// 新建节点的输入 (id 由数据库分配, status 初始为 UNDER_CONSTRUCTION)
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub institution_id: i64,
    pub template_id: Option<i64>,
    pub owner: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub node_type: Option<String>,
}

/// 配置版本快照
///
/// followup=true 表示该节点当前唯一的可变草稿行;
/// followup 翻转为 false (提交) 后该行不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub id: i64,
    pub institution_id: i64,
    pub configuration_node_id: i64,
    /// 版本标签 (提交时分配, 草稿期间为 None)
    pub version: Option<String>,
    pub version_date: Option<NaiveDateTime>,
    pub followup: bool,
}

/// 配置文档的一个取值单元
///
/// (configuration_id, configuration_attribute_id, list_index) 唯一;
/// 多值属性的 list_index 从 0 连续无间隙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationValue {
    pub id: i64,
    pub institution_id: i64,
    pub configuration_id: i64,
    pub configuration_attribute_id: i64,
    pub list_index: i64,
    pub value: Option<String>,
}
