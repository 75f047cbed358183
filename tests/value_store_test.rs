// ==========================================
// 取值存储测试
// ==========================================
// 职责: 验证 ValueStore 的写入守卫与列表维护 (左移重编号)
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod value_store_test {
    use exam_config_engine::domain::{NewAttribute, NewNode};
    use exam_config_engine::engine::EngineError;
    use exam_config_engine::AttributeType;

    use crate::test_helpers::{attribute_id, setup_service};

    fn table_attributes() -> Vec<NewAttribute> {
        vec![
            NewAttribute::new("permittedProcesses", AttributeType::Table),
            NewAttribute::new("permittedProcesses.executable", AttributeType::Text)
                .with_parent(1),
        ]
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let (_tmp, service) = setup_service(&table_attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "浏览器考试".to_string(),
                    ..Default::default()
                },
                "tester",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();

        service.put_value(draft.id, leaf, 0, Some("calc.exe")).unwrap();
        assert_eq!(
            service.value(draft.id, leaf, 0).unwrap(),
            Some("calc.exe".to_string())
        );

        // upsert 覆盖
        service.put_value(draft.id, leaf, 0, Some("notes.exe")).unwrap();
        assert_eq!(
            service.value(draft.id, leaf, 0).unwrap(),
            Some("notes.exe".to_string())
        );

        // 缺失 → None (默认值回退是解析层的职责)
        assert_eq!(service.value(draft.id, leaf, 5).unwrap(), None);
    }

    #[test]
    fn test_put_rejected_on_committed_version() {
        let (_tmp, service) = setup_service(&table_attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "n".to_string(),
                    ..Default::default()
                },
                "tester",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();
        service.put_value(draft.id, leaf, 0, Some("a")).unwrap();
        let committed = service.commit_draft(node.id, Some("v1")).unwrap();
        assert_eq!(committed.id, draft.id);

        let err = service.put_value(committed.id, leaf, 0, Some("b")).unwrap_err();
        assert!(matches!(err, EngineError::ImmutableVersion { .. }), "实际: {:?}", err);

        let err = service.delete_value_index(committed.id, leaf, 0).unwrap_err();
        assert!(matches!(err, EngineError::ImmutableVersion { .. }), "实际: {:?}", err);
    }

    // 具体场景: listIndex 0,1,2 = "a","b","c"; 删除 1 → 0="a", 1="c"
    #[test]
    fn test_delete_middle_index_shifts_left() {
        let (_tmp, service) = setup_service(&table_attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "n".to_string(),
                    ..Default::default()
                },
                "tester",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();

        for (i, v) in ["a", "b", "c"].iter().enumerate() {
            service.put_value(draft.id, leaf, i as i64, Some(v)).unwrap();
        }

        service.delete_value_index(draft.id, leaf, 1).unwrap();

        assert_eq!(service.list_indices(draft.id, leaf).unwrap(), vec![0, 1]);
        assert_eq!(service.value(draft.id, leaf, 0).unwrap(), Some("a".to_string()));
        assert_eq!(service.value(draft.id, leaf, 1).unwrap(), Some("c".to_string()));
    }

    // 对 n ≥ 1 的全部合法 k: 删除后索引保持 [0..n-2] 连续无间隙
    #[test]
    fn test_delete_index_contiguity_all_positions() {
        for n in 1..=4usize {
            for k in 0..n {
                let (_tmp, service) = setup_service(&table_attributes()).unwrap();
                let leaf = attribute_id(&service, "permittedProcesses.executable");

                let node = service
                    .create_node(
                        &NewNode {
                            institution_id: 1,
                            name: format!("n{}k{}", n, k),
                            ..Default::default()
                        },
                        "tester",
                    )
                    .unwrap();
                let draft = service.open_draft(node.id).unwrap();

                for i in 0..n {
                    service
                        .put_value(draft.id, leaf, i as i64, Some(&format!("v{}", i)))
                        .unwrap();
                }

                service.delete_value_index(draft.id, leaf, k as i64).unwrap();

                let indices = service.list_indices(draft.id, leaf).unwrap();
                let expected: Vec<i64> = (0..(n as i64 - 1)).collect();
                assert_eq!(indices, expected, "n={} k={}", n, k);

                // 保序: 被删元素之外的值依原相对顺序左移
                let mut expected_values: Vec<String> =
                    (0..n).map(|i| format!("v{}", i)).collect();
                expected_values.remove(k);
                for (i, expected_value) in expected_values.iter().enumerate() {
                    assert_eq!(
                        service.value(draft.id, leaf, i as i64).unwrap().as_deref(),
                        Some(expected_value.as_str()),
                        "n={} k={} i={}",
                        n,
                        k,
                        i
                    );
                }
            }
        }
    }

    #[test]
    fn test_delete_missing_index_not_found() {
        let (_tmp, service) = setup_service(&table_attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "n".to_string(),
                    ..Default::default()
                },
                "tester",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();

        let err = service.delete_value_index(draft.id, leaf, 0).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }), "实际: {:?}", err);
    }

    #[test]
    fn test_put_rejects_gap_in_list_index() {
        let (_tmp, service) = setup_service(&table_attributes()).unwrap();
        let leaf = attribute_id(&service, "permittedProcesses.executable");

        let node = service
            .create_node(
                &NewNode {
                    institution_id: 1,
                    name: "n".to_string(),
                    ..Default::default()
                },
                "tester",
            )
            .unwrap();
        let draft = service.open_draft(node.id).unwrap();

        service.put_value(draft.id, leaf, 0, Some("a")).unwrap();
        // 长度 1, 合法追加位置是 1, 跳到 3 构成间隙
        let err = service.put_value(draft.id, leaf, 3, Some("d")).unwrap_err();
        assert!(
            matches!(err, EngineError::NonContiguousIndex { .. }),
            "实际: {:?}",
            err
        );
    }
}
