// ==========================================
// AttributeCatalog - 属性目录 (不可变快照)
// ==========================================
// 职责:
// 1. 装载时做全部完整性校验 (父链/依赖图无环, 引用可解析, 校验器已注册),
//    运行期查询不再递归防御
// 2. 以 Arc 共享的只读快照对外提供属性查询
// 3. CatalogHandle 支持模式迁移后的原子换载 (替换快照而非原地修改)
// ==========================================

use crate::domain::attribute::ConfigurationAttribute;
use crate::engine::error::{EngineError, EngineResult, SchemaErrorKind};
use crate::engine::validation;
use crate::repository::attribute_repo::ConfigurationAttributeRepository;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
pub struct AttributeCatalog {
    by_id: HashMap<i64, ConfigurationAttribute>,
    by_name: HashMap<String, i64>,
    /// 容器 → 子属性 id (按声明顺序)
    children: HashMap<i64, Vec<i64>>,
    /// 属性 → 直接依赖属性 id (名称已在装载时解析)
    dependencies: HashMap<i64, Vec<i64>>,
    /// 迭代顺序 (声明顺序)
    order: Vec<i64>,
}

impl AttributeCatalog {
    /// 从仓储装载完整目录
    pub fn load(repo: &ConfigurationAttributeRepository) -> EngineResult<Self> {
        let attributes = repo.find_all()?;
        let catalog = Self::from_attributes(attributes)?;
        tracing::debug!(count = catalog.order.len(), "属性目录装载完成");
        Ok(catalog)
    }

    /// 由属性列表构建快照, 执行全部装载期校验
    pub fn from_attributes(attributes: Vec<ConfigurationAttribute>) -> EngineResult<Self> {
        let mut by_id = HashMap::with_capacity(attributes.len());
        let mut by_name = HashMap::with_capacity(attributes.len());
        let mut order = Vec::with_capacity(attributes.len());

        for attr in attributes {
            if by_name.insert(attr.name.clone(), attr.id).is_some() {
                return Err(EngineError::schema(
                    SchemaErrorKind::DuplicateName,
                    format!("属性名重复: {}", attr.name),
                ));
            }
            order.push(attr.id);
            by_id.insert(attr.id, attr);
        }

        let children = Self::validate_parent_links(&by_id, &order)?;
        let dependencies = Self::validate_dependencies(&by_id, &by_name, &order)?;

        Ok(Self {
            by_id,
            by_name,
            children,
            dependencies,
            order,
        })
    }

    /// 父链校验: 引用存在 + 目标是容器类型 + 无环
    fn validate_parent_links(
        by_id: &HashMap<i64, ConfigurationAttribute>,
        order: &[i64],
    ) -> EngineResult<HashMap<i64, Vec<i64>>> {
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();

        for &id in order {
            let attr = &by_id[&id];
            let Some(parent_id) = attr.parent_id else {
                continue;
            };

            let parent = by_id.get(&parent_id).ok_or_else(|| {
                EngineError::schema(
                    SchemaErrorKind::InvalidParent,
                    format!("属性 {} 的 parent_id={} 不存在", attr.name, parent_id),
                )
            })?;
            if !parent.attribute_type.is_container() {
                return Err(EngineError::schema(
                    SchemaErrorKind::InvalidParent,
                    format!(
                        "属性 {} 的父属性 {} 不是容器类型 ({})",
                        attr.name, parent.name, parent.attribute_type
                    ),
                ));
            }

            children.entry(parent_id).or_default().push(id);
        }

        // 每个属性至多一个父引用, 沿父链上溯即可发现环
        for &id in order {
            let mut visited = HashSet::new();
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                if !visited.insert(current) {
                    return Err(EngineError::schema(
                        SchemaErrorKind::CyclicParentLink,
                        format!("属性 {} 的父链存在环", by_id[&id].name),
                    ));
                }
                cursor = by_id.get(&current).and_then(|a| a.parent_id);
            }
        }

        Ok(children)
    }

    /// 依赖校验: JSON 格式合法 + 名称可解析 + 依赖图无环 + 校验器已注册
    fn validate_dependencies(
        by_id: &HashMap<i64, ConfigurationAttribute>,
        by_name: &HashMap<String, i64>,
        order: &[i64],
    ) -> EngineResult<HashMap<i64, Vec<i64>>> {
        let mut dependencies: HashMap<i64, Vec<i64>> = HashMap::new();

        for &id in order {
            let attr = &by_id[&id];

            if let Some(validator) = attr.validator.as_deref() {
                if !validation::is_known_validator(validator) {
                    return Err(EngineError::schema(
                        SchemaErrorKind::UnknownValidator,
                        format!("属性 {} 引用未注册校验器: {}", attr.name, validator),
                    ));
                }
            }

            if let Some(raw) = attr.resources.as_deref() {
                serde_json::from_str::<Vec<String>>(raw).map_err(|e| {
                    EngineError::schema(
                        SchemaErrorKind::MalformedList,
                        format!("属性 {} 的 resources 非法: {}", attr.name, e),
                    )
                })?;
            }

            let dep_names: Vec<String> = match attr.dependencies.as_deref() {
                Some(raw) => serde_json::from_str(raw).map_err(|e| {
                    EngineError::schema(
                        SchemaErrorKind::MalformedList,
                        format!("属性 {} 的 dependencies 非法: {}", attr.name, e),
                    )
                })?,
                None => Vec::new(),
            };

            let mut dep_ids = Vec::with_capacity(dep_names.len());
            for name in &dep_names {
                let dep_id = by_name.get(name).ok_or_else(|| {
                    EngineError::schema(
                        SchemaErrorKind::UnknownAttribute,
                        format!("属性 {} 依赖的属性不存在: {}", attr.name, name),
                    )
                })?;
                dep_ids.push(*dep_id);
            }
            dependencies.insert(id, dep_ids);
        }

        // 依赖图环检测 (三色迭代 DFS)
        let mut color: HashMap<i64, u8> = HashMap::new(); // 0=白 1=灰 2=黑
        for &start in order {
            if color.get(&start).copied().unwrap_or(0) != 0 {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            color.insert(start, 1);
            while let Some((node, next)) = stack.last().copied() {
                let deps = &dependencies[&node];
                if next < deps.len() {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    let dep = deps[next];
                    match color.get(&dep).copied().unwrap_or(0) {
                        0 => {
                            color.insert(dep, 1);
                            stack.push((dep, 0));
                        }
                        1 => {
                            return Err(EngineError::schema(
                                SchemaErrorKind::CyclicDependency,
                                format!("属性 {} 的依赖链存在环", by_id[&dep].name),
                            ));
                        }
                        _ => {}
                    }
                } else {
                    color.insert(node, 2);
                    stack.pop();
                }
            }
        }

        Ok(dependencies)
    }

    /// 按 id 查询属性
    pub fn get(&self, id: i64) -> EngineResult<&ConfigurationAttribute> {
        self.by_id.get(&id).ok_or_else(|| {
            EngineError::schema(
                SchemaErrorKind::UnknownAttribute,
                format!("未知属性 id: {}", id),
            )
        })
    }

    /// 按名称查询属性
    pub fn get_by_name(&self, name: &str) -> EngineResult<&ConfigurationAttribute> {
        self.by_name
            .get(name)
            .and_then(|id| self.by_id.get(id))
            .ok_or_else(|| {
                EngineError::schema(
                    SchemaErrorKind::UnknownAttribute,
                    format!("未知属性名: {}", name),
                )
            })
    }

    /// 容器属性的子属性 (声明顺序)
    pub fn children(&self, id: i64) -> EngineResult<Vec<&ConfigurationAttribute>> {
        self.get(id)?;
        Ok(self
            .children
            .get(&id)
            .map(|ids| ids.iter().map(|cid| &self.by_id[cid]).collect())
            .unwrap_or_default())
    }

    /// 直接依赖 (声明顺序)
    pub fn direct_dependencies(&self, id: i64) -> EngineResult<Vec<&ConfigurationAttribute>> {
        self.get(id)?;
        Ok(self
            .dependencies
            .get(&id)
            .map(|ids| ids.iter().map(|did| &self.by_id[did]).collect())
            .unwrap_or_default())
    }

    /// 依赖传递闭包 (广度优先, 装载期已保证无环)
    pub fn resolve_dependencies(&self, id: i64) -> EngineResult<Vec<&ConfigurationAttribute>> {
        self.get(id)?;

        let mut seen = HashSet::new();
        let mut queue: Vec<i64> = self.dependencies.get(&id).cloned().unwrap_or_default();
        let mut closure = Vec::new();

        while let Some(dep_id) = queue.pop() {
            if !seen.insert(dep_id) {
                continue;
            }
            closure.push(&self.by_id[&dep_id]);
            if let Some(next) = self.dependencies.get(&dep_id) {
                queue.extend(next.iter().copied());
            }
        }

        Ok(closure)
    }

    /// 全部属性 (声明顺序)
    pub fn attributes(&self) -> impl Iterator<Item = &ConfigurationAttribute> {
        self.order.iter().map(move |id| &self.by_id[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ==========================================
// CatalogHandle - 快照持有者
// ==========================================

/// 进程级目录持有者: 读取方获取 Arc 快照, 重载以整体替换
pub struct CatalogHandle {
    inner: RwLock<Arc<AttributeCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: AttributeCatalog) -> Self {
        Self {
            inner: RwLock::new(Arc::new(catalog)),
        }
    }

    /// 当前快照
    pub fn current(&self) -> Arc<AttributeCatalog> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 重新装载并原子替换快照 (装载失败保持旧快照)
    pub fn reload(&self, repo: &ConfigurationAttributeRepository) -> EngineResult<()> {
        let fresh = Arc::new(AttributeCatalog::load(repo)?);
        match self.inner.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        tracing::info!("属性目录快照已替换");
        Ok(())
    }
}
