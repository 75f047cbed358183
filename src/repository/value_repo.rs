// ==========================================
// ConfigurationValueRepository - 配置取值仓储 (ValueStore)
// ==========================================
// 写路径不变式:
// - 目标版本必须是草稿 (followup=1), 可变性检查与写入在同一事务内,
//   保证没有写入跨越提交边界
// - delete_index 的左移重编号是单事务原子单元, 并发读者不会观察到
//   索引重复或缺失的中间态
// ==========================================

use crate::domain::configuration::ConfigurationValue;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

pub struct ConfigurationValueRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str =
    "id, institution_id, configuration_id, configuration_attribute_id, list_index, value";

impl ConfigurationValueRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 事务内读取目标版本的 (机构id, followup), 不存在或已提交时报错
    fn check_mutable(tx: &Transaction, configuration_id: i64) -> RepositoryResult<i64> {
        let row: Option<(i64, i64)> = tx
            .query_row(
                "SELECT institution_id, followup FROM configuration WHERE id = ?",
                params![configuration_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Err(RepositoryError::NotFound {
                entity: "configuration".to_string(),
                id: configuration_id.to_string(),
            }),
            Some((_, 0)) => Err(RepositoryError::ImmutableVersion { configuration_id }),
            Some((institution_id, _)) => Ok(institution_id),
        }
    }

    /// 写入/覆盖一个取值单元 (upsert)
    pub fn put(
        &self,
        configuration_id: i64,
        attribute_id: i64,
        list_index: i64,
        value: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let institution_id = Self::check_mutable(&tx, configuration_id)?;

        tx.execute(
            r#"INSERT INTO configuration_value (
                institution_id, configuration_id, configuration_attribute_id,
                list_index, value
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(configuration_id, configuration_attribute_id, list_index)
            DO UPDATE SET value = excluded.value"#,
            params![institution_id, configuration_id, attribute_id, list_index, value],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 读取单个取值单元 (缺失 → None, 默认值回退由调用方负责)
    pub fn get(
        &self,
        configuration_id: i64,
        attribute_id: i64,
        list_index: i64,
    ) -> RepositoryResult<Option<ConfigurationValue>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration_value \
                     WHERE configuration_id = ? AND configuration_attribute_id = ? \
                       AND list_index = ?",
                    SELECT_COLUMNS
                ),
                params![configuration_id, attribute_id, list_index],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 某属性在某版本下的全部列表索引 (升序, 按不变式连续)
    pub fn list_indices(
        &self,
        configuration_id: i64,
        attribute_id: i64,
    ) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT list_index FROM configuration_value \
             WHERE configuration_id = ? AND configuration_attribute_id = ? \
             ORDER BY list_index",
        )?;

        let indices = stmt
            .query_map(params![configuration_id, attribute_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(indices)
    }

    /// 某属性在某版本下的全部取值行 (按 list_index 升序)
    pub fn values_for(
        &self,
        configuration_id: i64,
        attribute_id: i64,
    ) -> RepositoryResult<Vec<ConfigurationValue>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM configuration_value \
             WHERE configuration_id = ? AND configuration_attribute_id = ? \
             ORDER BY list_index",
            SELECT_COLUMNS
        ))?;

        let values = stmt
            .query_map(params![configuration_id, attribute_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// 某版本的全部取值行 (属性、索引升序)
    pub fn all_for_configuration(
        &self,
        configuration_id: i64,
    ) -> RepositoryResult<Vec<ConfigurationValue>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM configuration_value \
             WHERE configuration_id = ? \
             ORDER BY configuration_attribute_id, list_index",
            SELECT_COLUMNS
        ))?;

        let values = stmt
            .query_map(params![configuration_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// 删除索引 k 并左移后续索引 (单事务)
    ///
    /// 重编号分两步走负数中转 (k+1..n-1 先翻为负, 再翻回 k..n-2),
    /// 否则批量 UPDATE 的逐行唯一检查可能在中间态撞上三元唯一约束
    pub fn delete_index(
        &self,
        configuration_id: i64,
        attribute_id: i64,
        list_index: i64,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::check_mutable(&tx, configuration_id)?;

        let deleted = tx.execute(
            "DELETE FROM configuration_value \
             WHERE configuration_id = ? AND configuration_attribute_id = ? AND list_index = ?",
            params![configuration_id, attribute_id, list_index],
        )?;
        if deleted == 0 {
            return Err(RepositoryError::NotFound {
                entity: "configuration_value".to_string(),
                id: format!(
                    "configuration_id={}, attribute_id={}, list_index={}",
                    configuration_id, attribute_id, list_index
                ),
            });
        }

        tx.execute(
            "UPDATE configuration_value SET list_index = -list_index \
             WHERE configuration_id = ? AND configuration_attribute_id = ? AND list_index > ?",
            params![configuration_id, attribute_id, list_index],
        )?;
        tx.execute(
            "UPDATE configuration_value SET list_index = -list_index - 1 \
             WHERE configuration_id = ? AND configuration_attribute_id = ? AND list_index < 0",
            params![configuration_id, attribute_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ConfigurationValue> {
        Ok(ConfigurationValue {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            configuration_id: row.get(2)?,
            configuration_attribute_id: row.get(3)?,
            list_index: row.get(4)?,
            value: row.get(5)?,
        })
    }
}
