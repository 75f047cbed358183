// ==========================================
// ValidationEngine - 配置取值校验
// ==========================================
// 职责:
// 1. 单值校验: 类型解析 / 选项集合 / 依赖门控 / 命名校验器
// 2. 提交前全量批量校验: 收集全部失败而非快速失败,
//    配置编辑器需要一次得到完整的错误反馈
// ==========================================

use crate::domain::attribute::ConfigurationAttribute;
use crate::domain::configuration::ConfigurationValue;
use crate::domain::types::AttributeType;
use crate::engine::catalog::AttributeCatalog;
use crate::engine::error::{EngineResult, ValidationFailure, ValidationKind};
use std::collections::BTreeMap;

// ==========================================
// 命名校验器注册表
// ==========================================
// 目录装载时用 is_known_validator 拒绝未注册名称,
// 运行期 CustomValidatorFailed 只表示"值不合法", 不表示"模式损坏"

const KNOWN_VALIDATORS: &[&str] = &[
    "notEmpty",
    "integer",
    "positiveInteger",
    "decimal",
    "percent",
    "url",
    "windowsPath",
];

/// 校验器名称是否已注册
pub fn is_known_validator(name: &str) -> bool {
    KNOWN_VALIDATORS.contains(&name)
}

fn run_named_validator(name: &str, value: &str) -> bool {
    match name {
        "notEmpty" => !value.trim().is_empty(),
        "integer" => value.trim().parse::<i64>().is_ok(),
        "positiveInteger" => value.trim().parse::<i64>().map(|n| n > 0).unwrap_or(false),
        "decimal" => value.trim().parse::<f64>().is_ok(),
        "percent" => value
            .trim()
            .parse::<f64>()
            .map(|n| (0.0..=100.0).contains(&n))
            .unwrap_or(false),
        "url" => value.starts_with("http://") || value.starts_with("https://"),
        // 盘符路径 (C:\ 或 C:/) 或 UNC 路径 (\\server\share)
        "windowsPath" => {
            let bytes = value.as_bytes();
            value.starts_with(r"\\")
                || (bytes.len() >= 3
                    && bytes[0].is_ascii_alphabetic()
                    && bytes[1] == b':'
                    && (bytes[2] == b'\\' || bytes[2] == b'/'))
        }
        // 未注册名称在目录装载时已被拒绝
        _ => false,
    }
}

/// 布尔语义判断: CHECKBOX 按 1/true, 其他类型按非空
fn is_enabling(attribute: &ConfigurationAttribute, value: &str) -> bool {
    match attribute.attribute_type {
        AttributeType::Checkbox => value == "1" || value.eq_ignore_ascii_case("true"),
        _ => !value.is_empty(),
    }
}

pub struct ValidationEngine;

impl ValidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 校验单个候选值
    ///
    /// current_values 为该版本当前的生效取值集 (依赖门控据此判断);
    /// 空值 (None 或空串) 视为"未填", 仅通过, 不触发任何规则
    pub fn validate(
        &self,
        catalog: &AttributeCatalog,
        attribute: &ConfigurationAttribute,
        list_index: i64,
        candidate: Option<&str>,
        current_values: &BTreeMap<i64, Vec<String>>,
    ) -> Result<(), ValidationFailure> {
        let failure = |kind: ValidationKind, message: String| ValidationFailure {
            attribute_id: attribute.id,
            attribute_name: attribute.name.clone(),
            list_index,
            kind,
            message,
        };

        // notEmpty 是必填语义, 空值不得绕过它
        if attribute.validator.as_deref() == Some("notEmpty")
            && candidate.map_or(true, |v| v.trim().is_empty())
        {
            return Err(failure(
                ValidationKind::CustomValidatorFailed,
                "校验器 notEmpty 拒绝空值".to_string(),
            ));
        }

        let Some(value) = candidate.filter(|v| !v.is_empty()) else {
            return Ok(());
        };

        // 1. 类型校验
        match attribute.attribute_type {
            AttributeType::Text => {}
            AttributeType::Number => {
                if value.trim().parse::<f64>().is_err() {
                    return Err(failure(
                        ValidationKind::TypeMismatch,
                        format!("无法解析为数值: {}", value),
                    ));
                }
            }
            AttributeType::Checkbox => {
                if !matches!(value, "0" | "1")
                    && !value.eq_ignore_ascii_case("true")
                    && !value.eq_ignore_ascii_case("false")
                {
                    return Err(failure(
                        ValidationKind::TypeMismatch,
                        format!("无法解析为布尔: {}", value),
                    ));
                }
            }
            AttributeType::SingleSelection | AttributeType::MultiSelection => {
                if !attribute.resource_list().iter().any(|r| r == value) {
                    return Err(failure(
                        ValidationKind::OutOfResourceSet,
                        format!("取值不在选项列表中: {}", value),
                    ));
                }
            }
            AttributeType::Table | AttributeType::Composite => {
                // 容器不持值: 叶子子属性各自落行
                return Err(failure(
                    ValidationKind::TypeMismatch,
                    "容器属性不应持有取值".to_string(),
                ));
            }
        }

        // 2. 依赖门控: 全部直接依赖必须处于使能状态
        if let Ok(deps) = catalog.direct_dependencies(attribute.id) {
            for dep in deps {
                let enabled = current_values
                    .get(&dep.id)
                    .and_then(|values| values.first())
                    .map(|v| is_enabling(dep, v))
                    .unwrap_or(false);
                if !enabled {
                    return Err(failure(
                        ValidationKind::DependencyUnmet,
                        format!("依赖属性 {} 当前未使能", dep.name),
                    ));
                }
            }
        }

        // 3. 命名校验器
        if let Some(validator) = attribute.validator.as_deref() {
            if !run_named_validator(validator, value) {
                return Err(failure(
                    ValidationKind::CustomValidatorFailed,
                    format!("校验器 {} 拒绝取值: {}", validator, value),
                ));
            }
        }

        Ok(())
    }

    /// 全量批量校验 (提交路径)
    ///
    /// 逐行校验草稿的全部取值, 收集所有失败;
    /// 模式级问题 (未知属性 id) 上抛为 SchemaError
    pub fn validate_all(
        &self,
        catalog: &AttributeCatalog,
        values: &[ConfigurationValue],
        current_values: &BTreeMap<i64, Vec<String>>,
    ) -> EngineResult<Vec<ValidationFailure>> {
        let mut failures = Vec::new();

        for row in values {
            let attribute = catalog.get(row.configuration_attribute_id)?;
            if let Err(f) = self.validate(
                catalog,
                attribute,
                row.list_index,
                row.value.as_deref(),
                current_values,
            ) {
                failures.push(f);
            }
        }

        Ok(failures)
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attribute::ConfigurationAttribute;

    fn attr(id: i64, name: &str, attribute_type: AttributeType) -> ConfigurationAttribute {
        ConfigurationAttribute {
            id,
            name: name.to_string(),
            attribute_type,
            parent_id: None,
            resources: None,
            validator: None,
            dependencies: None,
            default_value: None,
        }
    }

    fn catalog_of(attrs: Vec<ConfigurationAttribute>) -> AttributeCatalog {
        AttributeCatalog::from_attributes(attrs).unwrap()
    }

    fn kind_of(result: Result<(), ValidationFailure>) -> ValidationKind {
        result.unwrap_err().kind
    }

    #[test]
    fn test_number_type_mismatch() {
        let a = attr(1, "quitPasswordRetries", AttributeType::Number);
        let catalog = catalog_of(vec![a.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        assert!(engine.validate(&catalog, &a, 0, Some("3.5"), &current).is_ok());
        assert_eq!(
            kind_of(engine.validate(&catalog, &a, 0, Some("abc"), &current)),
            ValidationKind::TypeMismatch
        );
    }

    #[test]
    fn test_checkbox_values() {
        let a = attr(1, "allowQuit", AttributeType::Checkbox);
        let catalog = catalog_of(vec![a.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        for ok in ["0", "1", "true", "false", "TRUE"] {
            assert!(engine.validate(&catalog, &a, 0, Some(ok), &current).is_ok());
        }
        assert_eq!(
            kind_of(engine.validate(&catalog, &a, 0, Some("yes"), &current)),
            ValidationKind::TypeMismatch
        );
    }

    #[test]
    fn test_selection_out_of_resource_set() {
        let mut a = attr(1, "browserViewMode", AttributeType::SingleSelection);
        a.resources = Some(r#"["WINDOW", "FULLSCREEN", "TOUCH"]"#.to_string());
        let catalog = catalog_of(vec![a.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        assert!(engine
            .validate(&catalog, &a, 0, Some("FULLSCREEN"), &current)
            .is_ok());
        assert_eq!(
            kind_of(engine.validate(&catalog, &a, 0, Some("KIOSK"), &current)),
            ValidationKind::OutOfResourceSet
        );
    }

    #[test]
    fn test_container_rejects_value() {
        let t = attr(1, "permittedProcesses", AttributeType::Table);
        let catalog = catalog_of(vec![t.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        assert_eq!(
            kind_of(engine.validate(&catalog, &t, 0, Some("x"), &current)),
            ValidationKind::TypeMismatch
        );
    }

    #[test]
    fn test_dependency_gate() {
        let toggle = attr(1, "proxyEnabled", AttributeType::Checkbox);
        let mut host = attr(2, "proxyHost", AttributeType::Text);
        host.dependencies = Some(r#"["proxyEnabled"]"#.to_string());
        let catalog = catalog_of(vec![toggle, host.clone()]);
        let engine = ValidationEngine::new();

        let mut current = BTreeMap::new();
        current.insert(1, vec!["0".to_string()]);
        assert_eq!(
            kind_of(engine.validate(&catalog, &host, 0, Some("proxy.local"), &current)),
            ValidationKind::DependencyUnmet
        );

        current.insert(1, vec!["1".to_string()]);
        assert!(engine
            .validate(&catalog, &host, 0, Some("proxy.local"), &current)
            .is_ok());

        // 空值不触发依赖门控
        current.insert(1, vec!["0".to_string()]);
        assert!(engine.validate(&catalog, &host, 0, Some(""), &current).is_ok());
        assert!(engine.validate(&catalog, &host, 0, None, &current).is_ok());
    }

    #[test]
    fn test_named_validator() {
        let mut a = attr(1, "startUrl", AttributeType::Text);
        a.validator = Some("url".to_string());
        let catalog = catalog_of(vec![a.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        assert!(engine
            .validate(&catalog, &a, 0, Some("https://exam.example.org"), &current)
            .is_ok());
        assert_eq!(
            kind_of(engine.validate(&catalog, &a, 0, Some("ftp://x"), &current)),
            ValidationKind::CustomValidatorFailed
        );
    }

    #[test]
    fn test_not_empty_validator_rejects_blank() {
        let mut a = attr(1, "quitPassword", AttributeType::Text);
        a.validator = Some("notEmpty".to_string());
        let catalog = catalog_of(vec![a.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        // 必填属性的空值不得走"空值即通过"捷径
        for blank in [None, Some(""), Some("   ")] {
            assert_eq!(
                kind_of(engine.validate(&catalog, &a, 0, blank, &current)),
                ValidationKind::CustomValidatorFailed,
                "candidate: {:?}",
                blank
            );
        }
        assert!(engine.validate(&catalog, &a, 0, Some("x"), &current).is_ok());
    }

    #[test]
    fn test_windows_path_validator() {
        let mut a = attr(1, "permittedProcesses.path", AttributeType::Text);
        a.validator = Some("windowsPath".to_string());
        let catalog = catalog_of(vec![a.clone()]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        for ok in [r"C:\Program Files\calc.exe", "D:/tools/x.exe", r"\\fileserver\exam"] {
            assert!(engine.validate(&catalog, &a, 0, Some(ok), &current).is_ok());
        }
        assert_eq!(
            kind_of(engine.validate(&catalog, &a, 0, Some("calc.exe"), &current)),
            ValidationKind::CustomValidatorFailed
        );
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let n = attr(1, "n", AttributeType::Number);
        let c = attr(2, "c", AttributeType::Checkbox);
        let catalog = catalog_of(vec![n, c]);
        let engine = ValidationEngine::new();
        let current = BTreeMap::new();

        let rows = vec![
            ConfigurationValue {
                id: 1,
                institution_id: 1,
                configuration_id: 10,
                configuration_attribute_id: 1,
                list_index: 0,
                value: Some("abc".to_string()),
            },
            ConfigurationValue {
                id: 2,
                institution_id: 1,
                configuration_id: 10,
                configuration_attribute_id: 2,
                list_index: 0,
                value: Some("yes".to_string()),
            },
        ];

        let failures = engine.validate_all(&catalog, &rows, &current).unwrap();
        assert_eq!(failures.len(), 2);
    }
}
