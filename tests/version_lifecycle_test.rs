// ==========================================
// 版本生命周期测试
// ==========================================
// 职责: 验证草稿两态机、提交即拷贝快照语义、丢弃恢复
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod version_lifecycle_test {
    use exam_config_engine::domain::{NewAttribute, NewNode};
    use exam_config_engine::engine::EngineError;
    use exam_config_engine::{AttributeType, DraftState};

    use crate::test_helpers::{attribute_id, setup_service};

    fn base_attributes() -> Vec<NewAttribute> {
        vec![
            NewAttribute::new("quitPassword", AttributeType::Text).with_default("x"),
            NewAttribute::new("permittedProcesses", AttributeType::Table),
            NewAttribute::new("permittedProcesses.executable", AttributeType::Text)
                .with_parent(2),
        ]
    }

    fn new_node(name: &str) -> NewNode {
        NewNode {
            institution_id: 1,
            name: name.to_string(),
            ..Default::default()
        }
    }

    // 规格场景: 默认 "x" → 草稿写 "y" → 提交 v1 → 解析得 ["y"], 草稿不复存在
    #[test]
    fn test_commit_then_reopen_scenario() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let attr = attribute_id(&service, "quitPassword");

        let node = service.create_node(&new_node("场景A"), "tester").unwrap();
        assert_eq!(service.draft_state(node.id).unwrap(), DraftState::NoDraft);

        let draft = service.open_draft(node.id).unwrap();
        assert_eq!(service.draft_state(node.id).unwrap(), DraftState::DraftOpen);

        // 无模板无实例值 → 目录默认值
        let effective = service.resolve_effective(node.id, draft.id).unwrap();
        assert_eq!(effective.get(&attr).unwrap(), &vec!["x".to_string()]);

        service.put_value(draft.id, attr, 0, Some("y")).unwrap();
        let committed = service.commit_draft(node.id, Some("v1")).unwrap();
        assert!(!committed.followup);
        assert_eq!(committed.version.as_deref(), Some("v1"));

        let effective = service.resolve_effective(node.id, committed.id).unwrap();
        assert_eq!(effective.get(&attr).unwrap(), &vec!["y".to_string()]);

        // 草稿不复存在: 再次打开不报 AlreadyOpen
        assert_eq!(service.draft_state(node.id).unwrap(), DraftState::NoDraft);
        let second = service.open_draft(node.id).unwrap();
        assert_ne!(second.id, committed.id);
    }

    #[test]
    fn test_open_draft_twice_already_open() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let node = service.create_node(&new_node("双开"), "tester").unwrap();

        service.open_draft(node.id).unwrap();
        let err = service.open_draft(node.id).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyOpen { .. }), "实际: {:?}", err);
    }

    // 拷贝保真: 提交 → 再开草稿 → TABLE 属性逐索引与提交版本一致
    #[test]
    fn test_copy_fidelity_on_reopen() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service.create_node(&new_node("拷贝"), "tester").unwrap();
        let draft = service.open_draft(node.id).unwrap();
        for (i, v) in ["calc.exe", "notes.exe", "paint.exe"].iter().enumerate() {
            service.put_value(draft.id, leaf, i as i64, Some(v)).unwrap();
        }
        let committed = service.commit_draft(node.id, Some("v1")).unwrap();

        let reopened = service.open_draft(node.id).unwrap();
        assert_ne!(reopened.id, committed.id);

        for i in 0..3i64 {
            assert_eq!(
                service.value(reopened.id, leaf, i).unwrap(),
                service.value(committed.id, leaf, i).unwrap(),
                "index {}",
                i
            );
        }

        // 新草稿的写入不影响已提交版本
        service.put_value(reopened.id, leaf, 0, Some("other.exe")).unwrap();
        assert_eq!(
            service.value(committed.id, leaf, 0).unwrap(),
            Some("calc.exe".to_string())
        );
    }

    // 丢弃草稿后, 生效配置与打开前逐位一致
    #[test]
    fn test_discard_restores_resolution() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let attr = attribute_id(&service, "quitPassword");
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service.create_node(&new_node("丢弃"), "tester").unwrap();
        let draft = service.open_draft(node.id).unwrap();
        service.put_value(draft.id, attr, 0, Some("committed")).unwrap();
        service.put_value(draft.id, leaf, 0, Some("calc.exe")).unwrap();
        let committed = service.commit_draft(node.id, Some("v1")).unwrap();

        let before = service.resolve_effective(node.id, committed.id).unwrap();

        let scratch = service.open_draft(node.id).unwrap();
        service.put_value(scratch.id, attr, 0, Some("scratch")).unwrap();
        service.put_value(scratch.id, leaf, 1, Some("extra.exe")).unwrap();
        service.discard_draft(node.id).unwrap();

        let after = service.resolve_effective(node.id, committed.id).unwrap();
        assert_eq!(before, after);
        assert_eq!(service.draft_state(node.id).unwrap(), DraftState::NoDraft);
    }

    #[test]
    fn test_discard_without_draft_is_noop() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let node = service.create_node(&new_node("noop"), "tester").unwrap();

        assert!(service.discard_draft(node.id).is_ok());
        assert!(service.discard_draft(node.id).is_ok());
    }

    #[test]
    fn test_commit_without_draft_not_found() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let node = service.create_node(&new_node("空提交"), "tester").unwrap();

        let err = service.commit_draft(node.id, Some("v1")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }), "实际: {:?}", err);
    }

    #[test]
    fn test_version_listing_order_and_default_label() {
        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let node = service.create_node(&new_node("列表"), "tester").unwrap();

        service.open_draft(node.id).unwrap();
        let v1 = service.commit_draft(node.id, Some("v1")).unwrap();
        service.open_draft(node.id).unwrap();
        // 不给标签 → 时间戳派生
        let v2 = service.commit_draft(node.id, None).unwrap();
        assert!(v2.version.as_deref().unwrap_or("").starts_with('v'));

        let versions = service.versions_of(node.id).unwrap();
        assert_eq!(versions.len(), 2);
        // 新→旧
        assert_eq!(versions[0].id, v2.id);
        assert_eq!(versions[1].id, v1.id);
    }

    #[test]
    fn test_active_version_for_exam() {
        use exam_config_engine::ExamConfigurationMap;

        let (_tmp, service) = setup_service(&base_attributes()).unwrap();
        let attr = attribute_id(&service, "quitPassword");

        let node = service.create_node(&new_node("考试"), "tester").unwrap();
        let draft = service.open_draft(node.id).unwrap();
        service.put_value(draft.id, attr, 0, Some("s3cret")).unwrap();
        let committed = service.commit_draft(node.id, Some("v1")).unwrap();

        service
            .exam_map_repo()
            .insert(&ExamConfigurationMap {
                id: 0,
                institution_id: 1,
                exam_id: 77,
                configuration_node_id: node.id,
                encrypt_secret: Some("pwd".to_string()),
                client_group_id: None,
            })
            .unwrap();

        let later = committed.version_date.unwrap() + chrono::Duration::hours(1);
        let active = service.active_version_for(77, None, later).unwrap();
        assert_eq!(active, committed.id);

        // 提交前的时刻没有可用版本
        let earlier = committed.version_date.unwrap() - chrono::Duration::hours(1);
        let err = service.active_version_for(77, None, earlier).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }), "实际: {:?}", err);
    }
}
