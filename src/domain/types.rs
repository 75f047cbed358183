// ==========================================
// 考试配置版本管理引擎 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 属性类型 (Attribute Type)
// ==========================================
// TABLE/COMPOSITE 为容器类型: 自身不持值, 通过 parent_id 挂载子属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    Text,           // 自由文本
    Number,         // 数值 (DECIMAL 语义, 文本存储)
    Checkbox,       // 布尔 (0/1/true/false)
    SingleSelection, // 单选 (取值受 resources 约束)
    MultiSelection, // 多选 (多行, list_index 区分)
    Table,          // 表格容器
    Composite,      // 复合容器
}

impl AttributeType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AttributeType::Text => "TEXT",
            AttributeType::Number => "NUMBER",
            AttributeType::Checkbox => "CHECKBOX",
            AttributeType::SingleSelection => "SINGLE_SELECTION",
            AttributeType::MultiSelection => "MULTI_SELECTION",
            AttributeType::Table => "TABLE",
            AttributeType::Composite => "COMPOSITE",
        }
    }

    pub fn parse(s: &str) -> Option<AttributeType> {
        match s.trim().to_uppercase().as_str() {
            "TEXT" => Some(AttributeType::Text),
            "NUMBER" => Some(AttributeType::Number),
            "CHECKBOX" => Some(AttributeType::Checkbox),
            "SINGLE_SELECTION" => Some(AttributeType::SingleSelection),
            "MULTI_SELECTION" => Some(AttributeType::MultiSelection),
            "TABLE" => Some(AttributeType::Table),
            "COMPOSITE" => Some(AttributeType::Composite),
            _ => None,
        }
    }

    /// 是否为容器类型 (允许作为 parent_id 的引用目标)
    pub fn is_container(&self) -> bool {
        matches!(self, AttributeType::Table | AttributeType::Composite)
    }

    /// 是否为多值类型 (list_index 必须从 0 连续)
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, AttributeType::Table | AttributeType::MultiSelection)
    }

    /// 取值是否受 resources 选项列表约束
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            AttributeType::SingleSelection | AttributeType::MultiSelection
        )
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 节点状态 (Node Status)
// ==========================================
// 状态单向推进; 唯一例外是归档后的显式重新启用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    UnderConstruction, // 构建中
    ReadyToUse,        // 可用
    Archived,          // 已归档
}

impl NodeStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            NodeStatus::UnderConstruction => "UNDER_CONSTRUCTION",
            NodeStatus::ReadyToUse => "READY_TO_USE",
            NodeStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<NodeStatus> {
        match s.trim().to_uppercase().as_str() {
            "UNDER_CONSTRUCTION" => Some(NodeStatus::UnderConstruction),
            "READY_TO_USE" => Some(NodeStatus::ReadyToUse),
            "ARCHIVED" => Some(NodeStatus::Archived),
            _ => None,
        }
    }

    /// 状态转换矩阵
    ///
    /// 允许: 构建中→可用, 构建中→归档, 可用→归档, 归档→可用 (重新启用)
    pub fn can_transition_to(&self, target: NodeStatus) -> bool {
        match (self, target) {
            (NodeStatus::UnderConstruction, NodeStatus::ReadyToUse) => true,
            (NodeStatus::UnderConstruction, NodeStatus::Archived) => true,
            (NodeStatus::ReadyToUse, NodeStatus::Archived) => true,
            (NodeStatus::Archived, NodeStatus::ReadyToUse) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 草稿状态 (Draft State)
// ==========================================
// 每个节点的两态机: 无草稿 / 草稿打开 (followup=1 行存在)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftState {
    NoDraft,
    DraftOpen,
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftState::NoDraft => write!(f, "NO_DRAFT"),
            DraftState::DraftOpen => write!(f, "DRAFT_OPEN"),
        }
    }
}
