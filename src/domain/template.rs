// ==========================================
// 考试配置版本管理引擎 - 考试模板实体
// ==========================================

use serde::{Deserialize, Serialize};

/// 可复用默认值模板
///
/// configuration_template_id 指向充当模板的 ConfigurationNode,
/// 其最近提交版本的取值作为继承层参与生效配置解析;
/// 每个 (机构, 考试类型) 最多一个 institutional_default=true
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamTemplate {
    pub id: i64,
    pub institution_id: i64,
    pub configuration_template_id: Option<i64>,
    pub name: String,
    pub exam_type: Option<String>,
    /// 支持人员列表 (JSON 字符串数组)
    pub supporter: Option<String>,
    /// 指标模板 (序列化 JSON, 引擎不解释)
    pub indicator_templates: Option<String>,
    pub institutional_default: bool,
}

impl ExamTemplate {
    pub fn supporter_list(&self) -> Vec<String> {
        self.supporter
            .as_deref()
            .map(|raw| serde_json::from_str(raw).unwrap_or_default())
            .unwrap_or_default()
    }
}

/// 新建模板的输入 (id 由数据库分配)
#[derive(Debug, Clone, Default)]
pub struct NewTemplate {
    pub institution_id: i64,
    pub configuration_template_id: Option<i64>,
    pub name: String,
    pub exam_type: Option<String>,
    pub supporter: Option<String>,
    pub indicator_templates: Option<String>,
    pub institutional_default: bool,
}
