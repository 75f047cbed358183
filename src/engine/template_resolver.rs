// ==========================================
// TemplateResolver - 生效配置解析
// ==========================================
// 优先级由低到高: 目录默认值 → 模板节点提交值 → 实例取值行
// 合并粒度为"整属性": 实例在索引 0 有任意一行, 该属性的整个列表
// 即以实例为准, 不做跨层逐行合并 (避免模板行与实例行混排)
// ==========================================

use crate::domain::configuration::ConfigurationValue;
use crate::engine::catalog::CatalogHandle;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::configuration_repo::ConfigurationRepository;
use crate::repository::node_repo::ConfigurationNodeRepository;
use crate::repository::template_repo::ExamTemplateRepository;
use crate::repository::value_repo::ConfigurationValueRepository;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct TemplateResolver {
    node_repo: Arc<ConfigurationNodeRepository>,
    configuration_repo: Arc<ConfigurationRepository>,
    value_repo: Arc<ConfigurationValueRepository>,
    template_repo: Arc<ExamTemplateRepository>,
    catalog: Arc<CatalogHandle>,
}

impl TemplateResolver {
    pub fn new(
        node_repo: Arc<ConfigurationNodeRepository>,
        configuration_repo: Arc<ConfigurationRepository>,
        value_repo: Arc<ConfigurationValueRepository>,
        template_repo: Arc<ExamTemplateRepository>,
        catalog: Arc<CatalogHandle>,
    ) -> Self {
        Self {
            node_repo,
            configuration_repo,
            value_repo,
            template_repo,
            catalog,
        }
    }

    /// 解析某版本的生效取值集: attribute_id → 有序取值列表
    ///
    /// 标量属性列表长度为 1, 多值属性长度为 N (按 list_index 升序)
    pub fn resolve_effective(
        &self,
        node_id: i64,
        configuration_id: i64,
    ) -> EngineResult<BTreeMap<i64, Vec<String>>> {
        let node = self
            .node_repo
            .find_by_id(node_id)?
            .ok_or_else(|| EngineError::not_found("configuration_node", node_id))?;

        let configuration = self
            .configuration_repo
            .find_by_id(configuration_id)?
            .ok_or_else(|| EngineError::not_found("configuration", configuration_id))?;
        if configuration.configuration_node_id != node_id {
            return Err(EngineError::not_found(
                "configuration(节点不匹配)",
                configuration_id,
            ));
        }

        // 第 1 层: 目录默认值
        let catalog = self.catalog.current();
        let mut effective: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for attribute in catalog.attributes() {
            if let Some(default) = attribute.default_value.as_deref() {
                effective.insert(attribute.id, vec![default.to_string()]);
            }
        }

        // 第 2 层: 模板节点的最近提交值
        if let Some(template_id) = node.template_id {
            if let Some(source_id) = self.template_source_configuration(template_id)? {
                let rows = self.value_repo.all_for_configuration(source_id)?;
                overlay(&mut effective, &rows);
            }
        }

        // 第 3 层: 实例取值行
        let rows = self.value_repo.all_for_configuration(configuration_id)?;
        overlay(&mut effective, &rows);

        Ok(effective)
    }

    /// 模板 → 模板节点 → 最近提交版本 id
    fn template_source_configuration(&self, template_id: i64) -> EngineResult<Option<i64>> {
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
}

/// 以"整属性"粒度覆盖: 出现任意一行的属性, 其整个列表以本层为准
fn overlay(effective: &mut BTreeMap<i64, Vec<String>>, rows: &[ConfigurationValue]) {
    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.configuration_attribute_id)
            .or_default()
            .push(row.value.clone().unwrap_or_default());
    }
    for (attribute_id, values) in grouped {
        effective.insert(attribute_id, values);
    }
}
