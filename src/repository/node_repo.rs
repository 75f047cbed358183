// ==========================================
// ConfigurationNodeRepository - 配置节点仓储
// ==========================================

use crate::domain::configuration::{ConfigurationNode, NewNode};
use crate::domain::types::NodeStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ConfigurationNodeRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "id, institution_id, template_id, owner, name, description, \
     type, status, last_update_time, last_update_user";

impl ConfigurationNodeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建节点, 初始状态 UNDER_CONSTRUCTION
    pub fn insert(
        &self,
        node: &NewNode,
        now: NaiveDateTime,
        user: &str,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO configuration_node (
                institution_id, template_id, owner, name, description,
                type, status, last_update_time, last_update_user
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &node.institution_id,
                &node.template_id,
                &node.owner,
                &node.name,
                &node.description,
                &node.node_type,
                NodeStatus::UnderConstruction.as_db_str(),
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                user,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询节点
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ConfigurationNode>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration_node WHERE id = ?",
                    SELECT_COLUMNS
                ),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询机构的全部节点
    pub fn find_by_institution(
        &self,
        institution_id: i64,
    ) -> RepositoryResult<Vec<ConfigurationNode>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM configuration_node WHERE institution_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let nodes = stmt
            .query_map(params![institution_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    /// 更新节点元数据 (名称/描述/归属/模板引用), 同步 last_update_*
    pub fn update(
        &self,
        node: &ConfigurationNode,
        now: NaiveDateTime,
        user: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE configuration_node
               SET template_id = ?, owner = ?, name = ?, description = ?, type = ?,
                   last_update_time = ?, last_update_user = ?
               WHERE id = ?"#,
            params![
                &node.template_id,
                &node.owner,
                &node.name,
                &node.description,
                &node.node_type,
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                user,
                &node.id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "configuration_node".to_string(),
                id: node.id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新节点状态 (转换合法性由引擎层检查)
    pub fn update_status(
        &self,
        node_id: i64,
        status: NodeStatus,
        now: NaiveDateTime,
        user: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE configuration_node
               SET status = ?, last_update_time = ?, last_update_user = ?
               WHERE id = ?"#,
            params![
                status.as_db_str(),
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                user,
                node_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "configuration_node".to_string(),
                id: node_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除节点 (版本与取值经外键级联删除)
    pub fn delete(&self, node_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM configuration_node WHERE id = ?",
            params![node_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "configuration_node".to_string(),
                id: node_id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ConfigurationNode> {
        let status_str: String = row.get(7)?;
        let status = NodeStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                format!("未知节点状态: {}", status_str).into(),
            )
        })?;

        Ok(ConfigurationNode {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            template_id: row.get(2)?,
            owner: row.get(3)?,
            name: row.get(4)?,
            description: row.get(5)?,
            node_type: row.get(6)?,
            status,
            last_update_time: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(8)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    8,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            last_update_user: row.get(9)?,
        })
    }
}
