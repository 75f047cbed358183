// ==========================================
// 考试配置版本管理引擎 - 考试配置绑定实体
// ==========================================

use serde::{Deserialize, Serialize};

/// 考试 → 配置节点绑定
///
/// 引擎读取此表以确定运行中考试的活动版本;
/// encrypt_secret 对引擎不透明, client_group_id 提供可选的分组定向
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfigurationMap {
    pub id: i64,
    pub institution_id: i64,
    pub exam_id: i64,
    pub configuration_node_id: i64,
    pub encrypt_secret: Option<String>,
    pub client_group_id: Option<i64>,
}
