// ==========================================
// ConfigurationRepository - 配置版本仓储
// ==========================================
// 草稿唯一性由 idx_configuration_single_followup 部分唯一索引保证:
// create_draft 的 INSERT 在索引上冲突即表示已有草稿, 由引擎层决定重试/报错
// ==========================================

use crate::domain::configuration::Configuration;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ConfigurationRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str =
    "id, institution_id, configuration_node_id, version, version_date, followup";

impl ConfigurationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建草稿行并拷贝来源版本的全部取值 (单事务)
    ///
    /// source_configuration_id 为 None 时仅创建空草稿 (节点尚无任何可拷贝来源);
    /// 来源版本已提交不可变, 故在事务外选定来源是安全的
    pub fn create_draft(
        &self,
        node_id: i64,
        institution_id: i64,
        source_configuration_id: Option<i64>,
    ) -> RepositoryResult<Configuration> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO configuration (
                institution_id, configuration_node_id, version, version_date, followup
            ) VALUES (?, ?, NULL, NULL, 1)"#,
            params![institution_id, node_id],
        )?;
        let draft_id = tx.last_insert_rowid();

        if let Some(source_id) = source_configuration_id {
            tx.execute(
                r#"INSERT INTO configuration_value (
                    institution_id, configuration_id, configuration_attribute_id,
                    list_index, value
                )
                SELECT institution_id, ?, configuration_attribute_id, list_index, value
                FROM configuration_value
                WHERE configuration_id = ?"#,
                params![draft_id, source_id],
            )?;
        }

        tx.commit()?;

        Ok(Configuration {
            id: draft_id,
            institution_id,
            configuration_node_id: node_id,
            version: None,
            version_date: None,
            followup: true,
        })
    }

    /// 提交草稿: followup 翻转为 0, 分配版本标签与版本时间
    ///
    /// 受影响行数为 0 表示节点当前无草稿
    pub fn commit_draft(
        &self,
        node_id: i64,
        version_label: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<Configuration> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE configuration
               SET followup = 0, version = ?, version_date = ?
               WHERE configuration_node_id = ? AND followup = 1"#,
            params![
                version_label,
                now.format("%Y-%m-%d %H:%M:%S").to_string(),
                node_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "configuration(draft)".to_string(),
                id: node_id.to_string(),
            });
        }

        let committed = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration \
                     WHERE configuration_node_id = ? AND version = ? \
                     ORDER BY id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![node_id, version_label],
                Self::map_row,
            )
            .optional()?
            .ok_or_else(|| RepositoryError::InternalError(format!(
                "提交后未读到版本行: node_id={}, version={}",
                node_id, version_label
            )))?;

        Ok(committed)
    }

    /// 删除草稿行及其全部取值 (外键级联); 无草稿时返回 false
    pub fn delete_draft(&self, node_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM configuration WHERE configuration_node_id = ? AND followup = 1",
            params![node_id],
        )?;
        Ok(rows > 0)
    }

    /// 按 id 查询版本
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Configuration>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM configuration WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询节点当前草稿
    pub fn find_draft(&self, node_id: i64) -> RepositoryResult<Option<Configuration>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration \
                     WHERE configuration_node_id = ? AND followup = 1",
                    SELECT_COLUMNS
                ),
                params![node_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询节点最近提交版本 (version_date 相同时以 id 决出先后)
    pub fn latest_committed(&self, node_id: i64) -> RepositoryResult<Option<Configuration>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration \
                     WHERE configuration_node_id = ? AND followup = 0 \
                     ORDER BY version_date DESC, id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![node_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询节点在给定时刻或之前的最近提交版本
    pub fn committed_at_or_before(
        &self,
        node_id: i64,
        at: NaiveDateTime,
    ) -> RepositoryResult<Option<Configuration>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration \
                     WHERE configuration_node_id = ? AND followup = 0 AND version_date <= ? \
                     ORDER BY version_date DESC, id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![node_id, at.format("%Y-%m-%d %H:%M:%S").to_string()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询节点的全部提交版本 (新→旧)
    pub fn find_committed_by_node(&self, node_id: i64) -> RepositoryResult<Vec<Configuration>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM configuration \
             WHERE configuration_node_id = ? AND followup = 0 \
             ORDER BY version_date DESC, id DESC",
            SELECT_COLUMNS
        ))?;

        let versions = stmt
            .query_map(params![node_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    /// 统计节点的 followup=1 行数 (不变式断言用)
    pub fn count_drafts(&self, node_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM configuration WHERE configuration_node_id = ? AND followup = 1",
            params![node_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Configuration> {
        Ok(Configuration {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            configuration_node_id: row.get(2)?,
            version: row.get(3)?,
            version_date: row
                .get::<_, Option<String>>(4)?
                .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            followup: row.get::<_, i64>(5)? != 0,
        })
    }
}
