// ==========================================
// 考试配置版本管理引擎 - 布局元数据实体
// ==========================================
// 引擎只读消费: 按 view 分组产出解析文档, 不校验布局本身
// ==========================================

use serde::{Deserialize, Serialize};

/// 属性 → 界面位置的不透明映射
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientationPlacement {
    pub id: i64,
    pub config_attribute_id: i64,
    pub template_id: Option<i64>,
    pub view: Option<String>,
    pub group_label: Option<String>,
    pub x_position: i64,
    pub y_position: i64,
    pub width: i64,
    pub height: i64,
}
