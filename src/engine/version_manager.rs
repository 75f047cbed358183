// ==========================================
// VersionManager - 版本生命周期管理
// ==========================================
// 每节点两态机: NO_DRAFT / DRAFT_OPEN, 全部状态转换集中在此处
//
// 并发:
// - open_draft 的"每节点至多一个草稿"不变式由部分唯一索引保证;
//   插入冲突重试一次, 再次冲突上抛 AlreadyOpen (不无限重试)
// - 拷贝来源是已提交的不可变版本, 事务外选源是安全的
// - commit 的 全量校验→翻转 是持节点锁的独占区间 (NodeLocks);
//   草稿写入路径持同一把锁, 校验通过后的状态不会在翻转前被改写。
//   翻转之后的写入由 ValueStore 在写事务内检查 followup 拒绝
// ==========================================

use crate::domain::configuration::Configuration;
use crate::domain::types::DraftState;
use crate::engine::catalog::CatalogHandle;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::template_resolver::TemplateResolver;
use crate::engine::validation::ValidationEngine;
use crate::repository::configuration_repo::ConfigurationRepository;
use crate::repository::error::RepositoryError;
use crate::repository::node_repo::ConfigurationNodeRepository;
use crate::repository::template_repo::ExamTemplateRepository;
use crate::repository::value_repo::ConfigurationValueRepository;
use chrono::{NaiveDateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// NodeLocks - 每节点草稿操作互斥
// ==========================================

/// 按节点粒度的互斥锁表
///
/// 提交的 校验→翻转 区间与草稿取值写入必须持同一把节点锁,
/// 否则校验与翻转之间落库的写入会冻结未经全量校验的状态
pub struct NodeLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl NodeLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn for_node(&self, node_id: i64) -> Arc<Mutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(node_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 持节点锁执行闭包 (锁中毒时继续持有, 不传播 panic 状态)
    pub fn with_node<T>(&self, node_id: i64, f: impl FnOnce() -> T) -> T {
        let lock = self.for_node(node_id);
        let _guard = match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f()
    }
}

impl Default for NodeLocks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct VersionManager {
    node_repo: Arc<ConfigurationNodeRepository>,
    configuration_repo: Arc<ConfigurationRepository>,
    value_repo: Arc<ConfigurationValueRepository>,
    template_repo: Arc<ExamTemplateRepository>,
    resolver: Arc<TemplateResolver>,
    validation: ValidationEngine,
    catalog: Arc<CatalogHandle>,
    locks: Arc<NodeLocks>,
}

impl VersionManager {
    pub fn new(
        node_repo: Arc<ConfigurationNodeRepository>,
        configuration_repo: Arc<ConfigurationRepository>,
        value_repo: Arc<ConfigurationValueRepository>,
        template_repo: Arc<ExamTemplateRepository>,
        resolver: Arc<TemplateResolver>,
        catalog: Arc<CatalogHandle>,
        locks: Arc<NodeLocks>,
    ) -> Self {
        Self {
            node_repo,
            configuration_repo,
            value_repo,
            template_repo,
            resolver,
            validation: ValidationEngine::new(),
            catalog,
            locks,
        }
    }

    /// 节点当前草稿状态
    pub fn draft_state(&self, node_id: i64) -> EngineResult<DraftState> {
        match self.configuration_repo.find_draft(node_id)? {
            Some(_) => Ok(DraftState::DraftOpen),
            None => Ok(DraftState::NoDraft),
        }
    }

    /// 打开草稿: NO_DRAFT → DRAFT_OPEN
    ///
    /// 新草稿拷贝最近提交版本的全部取值;
    /// 节点尚无提交版本时退回模板节点的最近提交版本
    pub fn open_draft(&self, node_id: i64) -> EngineResult<Configuration> {
        let node = self
            .node_repo
            .find_by_id(node_id)?
            .ok_or_else(|| EngineError::not_found("configuration_node", node_id))?;

        let source_id = match self.configuration_repo.latest_committed(node_id)? {
            Some(committed) => Some(committed.id),
            None => self.template_source(node.template_id)?,
        };

        for attempt in 0..2 {
            match self
                .configuration_repo
                .create_draft(node_id, node.institution_id, source_id)
            {
                Ok(draft) => {
                    tracing::info!(
                        node_id,
                        draft_id = draft.id,
                        source_id,
                        "草稿已打开"
                    );
                    return Ok(draft);
                }
                Err(RepositoryError::UniqueConstraintViolation(_)) if attempt == 0 => {
                    continue;
                }
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    return Err(EngineError::AlreadyOpen { node_id });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::AlreadyOpen { node_id })
    }

    /// 提交草稿: DRAFT_OPEN → NO_DRAFT
    ///
    /// 全量批量校验, 任一失败则整体中止 (附带全部失败项);
    /// version_label 为 None 时派生时间戳标签。
    /// 校验与翻转在节点锁内完成, 中途不接受草稿写入
    pub fn commit(
        &self,
        node_id: i64,
        version_label: Option<&str>,
    ) -> EngineResult<Configuration> {
        self.locks
            .with_node(node_id, || self.commit_locked(node_id, version_label))
    }

    fn commit_locked(
        &self,
        node_id: i64,
        version_label: Option<&str>,
    ) -> EngineResult<Configuration> {
        let draft = self
            .configuration_repo
            .find_draft(node_id)?
            .ok_or_else(|| EngineError::not_found("configuration(draft)", node_id))?;

        let rows = self.value_repo.all_for_configuration(draft.id)?;
        let effective = self.resolver.resolve_effective(node_id, draft.id)?;
        let catalog = self.catalog.current();
        let failures = self.validation.validate_all(&catalog, &rows, &effective)?;
        if !failures.is_empty() {
            tracing::warn!(
                node_id,
                draft_id = draft.id,
                failure_count = failures.len(),
                "提交校验未通过"
            );
            return Err(EngineError::Validation(failures));
        }

        let now = Self::now();
        let label = match version_label {
            Some(label) => label.to_string(),
            None => derive_version_label(now),
        };

        let committed = self.configuration_repo.commit_draft(node_id, &label, now)?;
        tracing::info!(
            node_id,
            configuration_id = committed.id,
            version = %label,
            "版本已提交"
        );
        Ok(committed)
    }

    /// 丢弃草稿: 删除草稿行及其全部取值; 无草稿时为 no-op
    pub fn discard_draft(&self, node_id: i64) -> EngineResult<()> {
        self.locks.with_node(node_id, || {
            let existed = self.configuration_repo.delete_draft(node_id)?;
            if existed {
                tracing::info!(node_id, "草稿已丢弃");
            }
            Ok(())
        })
    }

    fn template_source(&self, template_id: Option<i64>) -> EngineResult<Option<i64>> {
        let Some(template_id) = template_id else {
            return Ok(None);
        };
        let template = self
            .template_repo
            .find_by_id(template_id)?
            .ok_or_else(|| EngineError::not_found("exam_template", template_id))?;
        let Some(template_node_id) = template.configuration_template_id else {
            return Ok(None);
        };
        Ok(self
            .configuration_repo
            .latest_committed(template_node_id)?
            .map(|c| c.id))
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// 时间戳派生版本标签, 短 uuid 后缀防同秒重名
fn derive_version_label(now: NaiveDateTime) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("v{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}
