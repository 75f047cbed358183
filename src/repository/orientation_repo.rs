// ==========================================
// OrientationRepository - 布局元数据仓储
// ==========================================
// 布局对引擎不透明: 仅按模板读取, 供解析文档按 view 分组

use crate::domain::layout::OrientationPlacement;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct OrientationRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "id, config_attribute_id, template_id, view, group_label, \
     x_position, y_position, width, height";

impl OrientationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增布局记录, 返回分配的 id
    pub fn insert(&self, placement: &OrientationPlacement) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO orientation (
                config_attribute_id, template_id, view, group_label,
                x_position, y_position, width, height
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &placement.config_attribute_id,
                &placement.template_id,
                &placement.view,
                &placement.group_label,
                &placement.x_position,
                &placement.y_position,
                &placement.width,
                &placement.height,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 查询模板的全部布局记录
    pub fn find_by_template(
        &self,
        template_id: i64,
    ) -> RepositoryResult<Vec<OrientationPlacement>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM orientation WHERE template_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let placements = stmt
            .query_map(params![template_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(placements)
    }

    /// 删除模板的全部布局记录, 返回删除行数
    pub fn delete_by_template(&self, template_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM orientation WHERE template_id = ?",
            params![template_id],
        )?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<OrientationPlacement> {
        Ok(OrientationPlacement {
            id: row.get(0)?,
            config_attribute_id: row.get(1)?,
            template_id: row.get(2)?,
            view: row.get(3)?,
            group_label: row.get(4)?,
            x_position: row.get(5)?,
            y_position: row.get(6)?,
            width: row.get(7)?,
            height: row.get(8)?,
        })
    }
}
