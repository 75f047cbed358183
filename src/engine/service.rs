// ==========================================
// ConfigurationService - 引擎门面
// ==========================================
// 外部协作方唯一入口: 组合目录 / 取值存储 / 版本管理 / 解析 / 校验,
// 引擎错误原样上抛, 不改变错误类别
// ==========================================

use crate::domain::configuration::{Configuration, ConfigurationNode, NewNode};
use crate::domain::layout::OrientationPlacement;
use crate::domain::template::{ExamTemplate, NewTemplate};
use crate::domain::types::{DraftState, NodeStatus};
use crate::engine::catalog::{AttributeCatalog, CatalogHandle};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::template_resolver::TemplateResolver;
use crate::engine::validation::ValidationEngine;
use crate::engine::version_manager::{NodeLocks, VersionManager};
use crate::repository::attribute_repo::ConfigurationAttributeRepository;
use crate::repository::configuration_repo::ConfigurationRepository;
use crate::repository::exam_map_repo::ExamConfigurationMapRepository;
use crate::repository::node_repo::ConfigurationNodeRepository;
use crate::repository::orientation_repo::OrientationRepository;
use crate::repository::template_repo::ExamTemplateRepository;
use crate::repository::value_repo::ConfigurationValueRepository;
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 解析文档中的单个属性 (含不透明布局位置)
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedAttribute {
    pub attribute_id: i64,
    pub name: String,
    pub values: Vec<String>,
    pub placement: Option<OrientationPlacement>,
}

/// 未落入任何 view 的属性归入此组
pub const DEFAULT_VIEW: &str = "default";

pub struct ConfigurationService {
    attribute_repo: Arc<ConfigurationAttributeRepository>,
    node_repo: Arc<ConfigurationNodeRepository>,
    configuration_repo: Arc<ConfigurationRepository>,
    value_repo: Arc<ConfigurationValueRepository>,
    template_repo: Arc<ExamTemplateRepository>,
    orientation_repo: Arc<OrientationRepository>,
    exam_map_repo: Arc<ExamConfigurationMapRepository>,
    catalog: Arc<CatalogHandle>,
    resolver: Arc<TemplateResolver>,
    version_manager: VersionManager,
    validation: ValidationEngine,
    /// 与 VersionManager 共享: 草稿写入与提交的 校验→翻转 区间互斥
    draft_locks: Arc<NodeLocks>,
}

impl ConfigurationService {
    /// 在共享连接上构建全套仓储与引擎, 并装载属性目录
    pub fn new(conn: Arc<Mutex<Connection>>) -> EngineResult<Self> {
        let attribute_repo = Arc::new(ConfigurationAttributeRepository::new(conn.clone()));
        let node_repo = Arc::new(ConfigurationNodeRepository::new(conn.clone()));
        let configuration_repo = Arc::new(ConfigurationRepository::new(conn.clone()));
        let value_repo = Arc::new(ConfigurationValueRepository::new(conn.clone()));
        let template_repo = Arc::new(ExamTemplateRepository::new(conn.clone()));
        let orientation_repo = Arc::new(OrientationRepository::new(conn.clone()));
        let exam_map_repo = Arc::new(ExamConfigurationMapRepository::new(conn));

        let catalog = Arc::new(CatalogHandle::new(AttributeCatalog::load(&attribute_repo)?));

        let resolver = Arc::new(TemplateResolver::new(
            node_repo.clone(),
            configuration_repo.clone(),
            value_repo.clone(),
            template_repo.clone(),
            catalog.clone(),
        ));

        let draft_locks = Arc::new(NodeLocks::new());
        let version_manager = VersionManager::new(
            node_repo.clone(),
            configuration_repo.clone(),
            value_repo.clone(),
            template_repo.clone(),
            resolver.clone(),
            catalog.clone(),
            draft_locks.clone(),
        );

        Ok(Self {
            attribute_repo,
            node_repo,
            configuration_repo,
            value_repo,
            template_repo,
            orientation_repo,
            exam_map_repo,
            catalog,
            resolver,
            version_manager,
            validation: ValidationEngine::new(),
            draft_locks,
        })
    }

    // ==========================================
    // 属性目录
    // ==========================================

    /// 当前目录快照
    pub fn catalog(&self) -> Arc<AttributeCatalog> {
        self.catalog.current()
    }

    /// 模式迁移后重新装载目录 (原子替换快照)
    pub fn reload_catalog(&self) -> EngineResult<()> {
        self.catalog.reload(&self.attribute_repo)
    }

    // ==========================================
    // 节点生命周期
    // ==========================================

    /// 新建配置节点, 初始状态 UNDER_CONSTRUCTION
    pub fn create_node(&self, node: &NewNode, user: &str) -> EngineResult<ConfigurationNode> {
        let id = self.node_repo.insert(node, Self::now(), user)?;
        let created = self
            .node_repo
            .find_by_id(id)?
            .ok_or_else(|| EngineError::not_found("configuration_node", id))?;
        tracing::info!(node_id = id, name = %created.name, "配置节点已创建");
        Ok(created)
    }

    pub fn node(&self, node_id: i64) -> EngineResult<ConfigurationNode> {
        self.node_repo
            .find_by_id(node_id)?
            .ok_or_else(|| EngineError::not_found("configuration_node", node_id))
    }

    pub fn nodes_for_institution(
        &self,
        institution_id: i64,
    ) -> EngineResult<Vec<ConfigurationNode>> {
        Ok(self.node_repo.find_by_institution(institution_id)?)
    }

    /// 节点状态转换 (单向推进; 归档后仅允许显式重新启用)
    pub fn set_node_status(
        &self,
        node_id: i64,
        status: NodeStatus,
        user: &str,
    ) -> EngineResult<()> {
        let node = self.node(node_id)?;
        if !node.status.can_transition_to(status) {
            return Err(EngineError::InvalidStatusTransition {
                from: node.status,
                to: status,
            });
        }
        self.node_repo
            .update_status(node_id, status, Self::now(), user)?;
        tracing::info!(node_id, from = %node.status, to = %status, "节点状态已转换");
        Ok(())
    }

    pub fn update_node(&self, node: &ConfigurationNode, user: &str) -> EngineResult<()> {
        Ok(self.node_repo.update(node, Self::now(), user)?)
    }

    /// 删除节点 (版本与取值级联删除; 考试引用检查由外部协作方负责)
    pub fn delete_node(&self, node_id: i64) -> EngineResult<()> {
        self.node_repo.delete(node_id)?;
        tracing::info!(node_id, "配置节点已删除");
        Ok(())
    }

    // ==========================================
    // 版本生命周期
    // ==========================================

    pub fn draft_state(&self, node_id: i64) -> EngineResult<DraftState> {
        self.version_manager.draft_state(node_id)
    }

    pub fn open_draft(&self, node_id: i64) -> EngineResult<Configuration> {
        self.version_manager.open_draft(node_id)
    }

    pub fn commit_draft(
        &self,
        node_id: i64,
        version_label: Option<&str>,
    ) -> EngineResult<Configuration> {
        self.version_manager.commit(node_id, version_label)
    }

    pub fn discard_draft(&self, node_id: i64) -> EngineResult<()> {
        self.version_manager.discard_draft(node_id)
    }

    /// 节点的全部提交版本 (新→旧)
    pub fn versions_of(&self, node_id: i64) -> EngineResult<Vec<Configuration>> {
        Ok(self.configuration_repo.find_committed_by_node(node_id)?)
    }

    /// 节点当前草稿 (若有)
    pub fn draft_of(&self, node_id: i64) -> EngineResult<Option<Configuration>> {
        Ok(self.configuration_repo.find_draft(node_id)?)
    }

    // ==========================================
    // 取值读写
    // ==========================================

    /// 写入草稿取值 (先校验后落库)
    ///
    /// 多值属性要求 list_index 落在 0..=当前长度 内 (保持连续性)
    pub fn put_value(
        &self,
        configuration_id: i64,
        attribute_id: i64,
        list_index: i64,
        value: Option<&str>,
    ) -> EngineResult<()> {
        let catalog = self.catalog.current();
        let attribute = catalog.get(attribute_id)?;

        if attribute.attribute_type.is_multi_valued() || list_index > 0 {
            let len = self
                .value_repo
                .list_indices(configuration_id, attribute_id)?
                .len() as i64;
            if list_index < 0 || list_index > len {
                return Err(EngineError::NonContiguousIndex {
                    attribute_id,
                    list_index,
                    len,
                });
            }
        }

        let configuration = self
            .configuration_repo
            .find_by_id(configuration_id)?
            .ok_or_else(|| EngineError::not_found("configuration", configuration_id))?;
        let node_id = configuration.configuration_node_id;

        // 节点锁: 提交的 校验→翻转 区间内不接受草稿写入
        self.draft_locks.with_node(node_id, || {
            let effective = self.resolver.resolve_effective(node_id, configuration_id)?;

            self.validation
                .validate(&catalog, attribute, list_index, value, &effective)
                .map_err(|failure| EngineError::Validation(vec![failure]))?;

            Ok(self
                .value_repo
                .put(configuration_id, attribute_id, list_index, value)?)
        })
    }

    /// 读取单个取值单元 (缺失 → None; 默认值回退走 resolve_effective)
    pub fn value(
        &self,
        configuration_id: i64,
        attribute_id: i64,
        list_index: i64,
    ) -> EngineResult<Option<String>> {
        Ok(self
            .value_repo
            .get(configuration_id, attribute_id, list_index)?
            .map(|row| row.value.unwrap_or_default()))
    }

    pub fn list_indices(
        &self,
        configuration_id: i64,
        attribute_id: i64,
    ) -> EngineResult<Vec<i64>> {
        Ok(self.value_repo.list_indices(configuration_id, attribute_id)?)
    }

    /// 删除列表索引并左移后续索引 (原子)
    ///
    /// 删除也是草稿写入: 持节点锁, 不落在提交的校验与翻转之间
    pub fn delete_value_index(
        &self,
        configuration_id: i64,
        attribute_id: i64,
        list_index: i64,
    ) -> EngineResult<()> {
        let configuration = self
            .configuration_repo
            .find_by_id(configuration_id)?
            .ok_or_else(|| EngineError::not_found("configuration", configuration_id))?;

        self.draft_locks
            .with_node(configuration.configuration_node_id, || {
                Ok(self
                    .value_repo
                    .delete_index(configuration_id, attribute_id, list_index)?)
            })
    }

    // ==========================================
    // 解析
    // ==========================================

    /// 生效配置: attribute_id → 有序取值列表
    pub fn resolve_effective(
        &self,
        node_id: i64,
        configuration_id: i64,
    ) -> EngineResult<BTreeMap<i64, Vec<String>>> {
        self.resolver.resolve_effective(node_id, configuration_id)
    }

    /// 解析文档: 生效取值按布局 view 分组 (布局本身不做校验)
    pub fn resolve_document(
        &self,
        node_id: i64,
        configuration_id: i64,
    ) -> EngineResult<BTreeMap<String, Vec<ResolvedAttribute>>> {
        let node = self.node(node_id)?;
        let effective = self.resolver.resolve_effective(node_id, configuration_id)?;

        let mut placements: BTreeMap<i64, OrientationPlacement> = BTreeMap::new();
        if let Some(template_id) = node.template_id {
            for placement in self.orientation_repo.find_by_template(template_id)? {
                placements.insert(placement.config_attribute_id, placement);
            }
        }

        let catalog = self.catalog.current();
        let mut document: BTreeMap<String, Vec<ResolvedAttribute>> = BTreeMap::new();
        for (attribute_id, values) in effective {
            let attribute = catalog.get(attribute_id)?;
            let placement = placements.get(&attribute_id).cloned();
            let view = placement
                .as_ref()
                .and_then(|p| p.view.clone())
                .unwrap_or_else(|| DEFAULT_VIEW.to_string());

            document.entry(view).or_default().push(ResolvedAttribute {
                attribute_id,
                name: attribute.name.clone(),
                values,
                placement,
            });
        }

        Ok(document)
    }

    // ==========================================
    // 考试绑定
    // ==========================================

    /// 运行中考试的活动版本: 绑定行 → 节点 → at 时刻或之前的最近提交版本
    ///
    /// client_group_id 定向行优先于无分组行
    pub fn active_version_for(
        &self,
        exam_id: i64,
        client_group_id: Option<i64>,
        at: NaiveDateTime,
    ) -> EngineResult<i64> {
        let map_row = self
            .exam_map_repo
            .find_for(exam_id, client_group_id)?
            .ok_or_else(|| EngineError::not_found("exam_configuration_map", exam_id))?;

        let configuration = self
            .configuration_repo
            .committed_at_or_before(map_row.configuration_node_id, at)?
            .ok_or_else(|| {
                EngineError::not_found("configuration", map_row.configuration_node_id)
            })?;

        Ok(configuration.id)
    }

    pub fn exam_map_repo(&self) -> &Arc<ExamConfigurationMapRepository> {
        &self.exam_map_repo
    }

    // ==========================================
    // 模板
    // ==========================================

    /// 新建模板 (同机构同考试类型的第二个默认模板触发唯一约束)
    pub fn create_template(&self, template: &NewTemplate) -> EngineResult<ExamTemplate> {
        let id = self.template_repo.insert(template)?;
        self.template_repo
            .find_by_id(id)?
            .ok_or_else(|| EngineError::not_found("exam_template", id))
    }

    pub fn template(&self, template_id: i64) -> EngineResult<ExamTemplate> {
        self.template_repo
            .find_by_id(template_id)?
            .ok_or_else(|| EngineError::not_found("exam_template", template_id))
    }

    pub fn templates_for_institution(
        &self,
        institution_id: i64,
    ) -> EngineResult<Vec<ExamTemplate>> {
        Ok(self.template_repo.find_by_institution(institution_id)?)
    }

    pub fn institutional_default_template(
        &self,
        institution_id: i64,
        exam_type: &str,
    ) -> EngineResult<Option<ExamTemplate>> {
        Ok(self
            .template_repo
            .institutional_default_for(institution_id, exam_type)?)
    }

    // ==========================================
    // 布局
    // ==========================================

    pub fn add_placement(&self, placement: &OrientationPlacement) -> EngineResult<i64> {
        Ok(self.orientation_repo.insert(placement)?)
    }

    pub fn placements_for_template(
        &self,
        template_id: i64,
    ) -> EngineResult<Vec<OrientationPlacement>> {
        Ok(self.orientation_repo.find_by_template(template_id)?)
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}
