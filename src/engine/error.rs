// ==========================================
// 考试配置版本管理引擎 - 引擎层错误类型
// ==========================================
// 错误分层:
// - Schema: 目录完整性问题, 对本次操作致命, 永不自动重试
// - Validation: 按属性批量收集, 可恢复, 不破坏状态
// - ImmutableVersion / AlreadyOpen / NotFound: 生命周期误用, 立即上抛
// - Storage: 持久化协作方失败, 原样传播 (多行变更已事务回滚)
// ==========================================

use crate::domain::types::NodeStatus;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 模式错误细分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaErrorKind {
    UnknownAttribute,
    DuplicateName,
    InvalidParent,
    CyclicParentLink,
    CyclicDependency,
    UnknownValidator,
    MalformedList,
}

/// 校验失败细分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationKind {
    TypeMismatch,
    OutOfResourceSet,
    DependencyUnmet,
    CustomValidatorFailed,
}

/// 单个属性的校验失败记录 (批量诊断的最小单元)
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    pub attribute_id: i64,
    pub attribute_name: String,
    pub list_index: i64,
    pub kind: ValidationKind,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} (id={}, index={}): {}",
            self.kind, self.attribute_name, self.attribute_id, self.list_index, self.message
        )
    }
}

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("模式错误 [{kind:?}]: {detail}")]
    Schema {
        kind: SchemaErrorKind,
        detail: String,
    },

    #[error("配置校验失败: {} 个属性未通过", .0.len())]
    Validation(Vec<ValidationFailure>),

    #[error("版本已提交, 禁止写入: configuration_id={configuration_id}")]
    ImmutableVersion { configuration_id: i64 },

    #[error("节点已存在未提交草稿: node_id={node_id}")]
    AlreadyOpen { node_id: i64 },

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("无效的状态转换: {from} -> {to}")]
    InvalidStatusTransition { from: NodeStatus, to: NodeStatus },

    #[error("列表索引不连续: attribute_id={attribute_id}, list_index={list_index}, 当前长度={len}")]
    NonContiguousIndex {
        attribute_id: i64,
        list_index: i64,
        len: i64,
    },

    #[error("存储层错误: {0}")]
    Storage(RepositoryError),
}

impl EngineError {
    pub fn schema(kind: SchemaErrorKind, detail: impl Into<String>) -> Self {
        EngineError::Schema {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

// 仓储错误按类别映射, 不改变错误语义
impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ImmutableVersion { configuration_id } => {
                EngineError::ImmutableVersion { configuration_id }
            }
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Storage(other),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
