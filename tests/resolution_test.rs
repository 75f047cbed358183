// ==========================================
// 生效配置解析测试
// ==========================================
// 职责: 验证 默认值 → 模板值 → 实例值 的三层优先级与整属性覆盖粒度
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod resolution_test {
    use exam_config_engine::domain::{NewAttribute, NewNode, NewTemplate};
    use exam_config_engine::engine::ConfigurationService;
    use exam_config_engine::AttributeType;
    use std::sync::Arc;

    use crate::test_helpers::{attribute_id, setup_service};

    fn attributes() -> Vec<NewAttribute> {
        vec![
            NewAttribute::new("browserViewMode", AttributeType::Text).with_default("WINDOW"),
            NewAttribute::new("permittedProcesses", AttributeType::Table),
            NewAttribute::new("permittedProcesses.executable", AttributeType::Text)
                .with_parent(2),
        ]
    }

    /// 构建模板链: 模板节点 (提交给定值) → ExamTemplate → 实例节点
    fn setup_with_template(
        service: &Arc<ConfigurationService>,
        template_values: &[(i64, i64, &str)], // (attribute_id, list_index, value)
    ) -> i64 {
        let template_node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "模板节点".to_string(),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        let draft = service.open_draft(template_node.id).unwrap();
        for (attr, index, value) in template_values {
            service.put_value(draft.id, *attr, *index, Some(value)).unwrap();
        }
        service.commit_draft(template_node.id, Some("t1")).unwrap();

        let template = service
            .create_template(&NewTemplate {
                institution_id: 1,
                configuration_template_id: Some(template_node.id),
                name: "标准考试模板".to_string(),
                exam_type: Some("BYOD".to_string()),
                ..Default::default()
            })
            .unwrap();

        let instance = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    template_id: Some(template.id),
                    name: "实例节点".to_string(),
                    ..Default::default()
                },
                "editor",
            )
            .unwrap();
        instance.id
    }

    #[test]
    fn test_catalog_default_only() {
        let (_tmp, service) = setup_service(&attributes()).unwrap();
        let attr = attribute_id(&service, "browserViewMode");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "裸节点".to_string(),
                    ..Default::default()
                },
                "editor",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();

        let effective = service.resolve_effective(node.id, draft.id).unwrap();
        assert_eq!(effective.get(&attr).unwrap(), &vec!["WINDOW".to_string()]);
    }

    #[test]
    fn test_template_overrides_default_scalar() {
        let (_tmp, service) = setup_service(&attributes()).unwrap();
        let attr = attribute_id(&service, "browserViewMode");

        let node_id = setup_with_template(&service, &[(attr, 0, "FULLSCREEN")]);
        let draft = service.open_draft(node_id).unwrap();

        let effective = service.resolve_effective(node_id, draft.id).unwrap();
        assert_eq!(effective.get(&attr).unwrap(), &vec!["FULLSCREEN".to_string()]);
    }

    #[test]
    fn test_instance_overrides_template_scalar() {
        let (_tmp, service) = setup_service(&attributes()).unwrap();
        let attr = attribute_id(&service, "browserViewMode");

        let node_id = setup_with_template(&service, &[(attr, 0, "FULLSCREEN")]);
        let draft = service.open_draft(node_id).unwrap();
        // open_draft 已从模板拷贝; 实例显式覆盖
        service.put_value(draft.id, attr, 0, Some("TOUCH")).unwrap();

        let effective = service.resolve_effective(node_id, draft.id).unwrap();
        assert_eq!(effective.get(&attr).unwrap(), &vec!["TOUCH".to_string()]);
    }

    // TABLE 粒度: 实例在索引 0 有行 → 整个列表以实例为准, 不与模板行混排
    #[test]
    fn test_table_whole_list_wins() {
        let (_tmp, service) = setup_service(&attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node_id = setup_with_template(
            &service,
            &[(leaf, 0, "calc.exe"), (leaf, 1, "notes.exe"), (leaf, 2, "paint.exe")],
        );

        let draft = service.open_draft(node_id).unwrap();
        // 实例改写整个列表: 删除两行只留一行后再覆盖
        service.delete_value_index(draft.id, leaf, 2).unwrap();
        service.delete_value_index(draft.id, leaf, 1).unwrap();
        service.put_value(draft.id, leaf, 0, Some("exam.exe")).unwrap();

        let effective = service.resolve_effective(node_id, draft.id).unwrap();
        assert_eq!(effective.get(&leaf).unwrap(), &vec!["exam.exe".to_string()]);
    }

    // 模板继承经由解析层合并, 不依赖草稿拷贝: 空草稿也能看到模板值
    #[test]
    fn test_template_layer_without_instance_rows() {
        let (_tmp, service) = setup_service(&attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node_id = setup_with_template(&service, &[(leaf, 0, "calc.exe")]);
        let draft = service.open_draft(node_id).unwrap();
        // 抹掉拷贝来的实例行, 只剩模板层
        service.delete_value_index(draft.id, leaf, 0).unwrap();

        let effective = service.resolve_effective(node_id, draft.id).unwrap();
        assert_eq!(effective.get(&leaf).unwrap(), &vec!["calc.exe".to_string()]);
    }

    #[test]
    fn test_multi_row_table_resolution_order() {
        let (_tmp, service) = setup_service(&attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "表格".to_string(),
                    ..Default::default()
                },
                "editor",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();
        for (i, v) in ["a", "b", "c"].iter().enumerate() {
            service.put_value(draft.id, leaf, i as i64, Some(v)).unwrap();
        }

        let effective = service.resolve_effective(node.id, draft.id).unwrap();
        assert_eq!(
            effective.get(&leaf).unwrap(),
            &vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
