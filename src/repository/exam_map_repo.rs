// ==========================================
// ExamConfigurationMapRepository - 考试配置绑定仓储
// ==========================================

use crate::domain::exam_map::ExamConfigurationMap;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ExamConfigurationMapRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str =
    "id, institution_id, exam_id, configuration_node_id, encrypt_secret, client_group_id";

impl ExamConfigurationMapRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增绑定, 返回分配的 id
    pub fn insert(&self, map: &ExamConfigurationMap) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO exam_configuration_map (
                institution_id, exam_id, configuration_node_id,
                encrypt_secret, client_group_id
            ) VALUES (?, ?, ?, ?, ?)"#,
            params![
                &map.institution_id,
                &map.exam_id,
                &map.configuration_node_id,
                &map.encrypt_secret,
                &map.client_group_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 查询考试的全部绑定行
    pub fn find_by_exam(&self, exam_id: i64) -> RepositoryResult<Vec<ExamConfigurationMap>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exam_configuration_map WHERE exam_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let maps = stmt
            .query_map(params![exam_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(maps)
    }

    /// 为 (考试, 分组) 选定绑定行
    ///
    /// 分组定向行优先于无分组行; 未给出分组时只考虑无分组行
    pub fn find_for(
        &self,
        exam_id: i64,
        client_group_id: Option<i64>,
    ) -> RepositoryResult<Option<ExamConfigurationMap>> {
        let conn = self.get_conn()?;

        if let Some(group_id) = client_group_id {
            let scoped = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM exam_configuration_map \
                         WHERE exam_id = ? AND client_group_id = ? \
                         ORDER BY id LIMIT 1",
                        SELECT_COLUMNS
                    ),
                    params![exam_id, group_id],
                    Self::map_row,
                )
                .optional()?;
            if scoped.is_some() {
                return Ok(scoped);
            }
        }

        let unscoped = conn
            .query_row(
                &format!(
                    "SELECT {} FROM exam_configuration_map \
                     WHERE exam_id = ? AND client_group_id IS NULL \
                     ORDER BY id LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![exam_id],
                Self::map_row,
            )
            .optional()?;
        Ok(unscoped)
    }

    /// 删除绑定
    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM exam_configuration_map WHERE id = ?",
            params![id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "exam_configuration_map".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ExamConfigurationMap> {
        Ok(ExamConfigurationMap {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            exam_id: row.get(2)?,
            configuration_node_id: row.get(3)?,
            encrypt_secret: row.get(4)?,
            client_group_id: row.get(5)?,
        })
    }
}
