// ==========================================
// ConfigurationAttributeRepository - 配置属性仓储
// ==========================================
// 属性目录为全局只读模式数据: 仓储提供装载与维护入口,
// 运行期读取走 engine::catalog 的不可变快照
// ==========================================

use crate::domain::attribute::{ConfigurationAttribute, NewAttribute};
use crate::domain::types::AttributeType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ConfigurationAttributeRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str =
    "id, name, type, parent_id, resources, validator, dependencies, default_value";

impl ConfigurationAttributeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增属性定义, 返回分配的 id
    pub fn insert(&self, attribute: &NewAttribute) -> RepositoryResult<i64> {
        let attribute_type =
            attribute
                .attribute_type
                .ok_or_else(|| RepositoryError::FieldValueError {
                    field: "type".to_string(),
                    message: "属性类型缺失".to_string(),
                })?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO configuration_attribute (
                name, type, parent_id, resources, validator, dependencies, default_value
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &attribute.name,
                attribute_type.as_db_str(),
                &attribute.parent_id,
                &attribute.resources,
                &attribute.validator,
                &attribute.dependencies,
                &attribute.default_value,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询属性
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ConfigurationAttribute>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM configuration_attribute WHERE id = ?",
                    SELECT_COLUMNS
                ),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询全部属性 (按声明顺序, 即 id 升序)
    pub fn find_all(&self) -> RepositoryResult<Vec<ConfigurationAttribute>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM configuration_attribute ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let attributes = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attributes)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ConfigurationAttribute> {
        let type_str: String = row.get(2)?;
        let attribute_type = AttributeType::parse(&type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("未知属性类型: {}", type_str).into(),
            )
        })?;

        Ok(ConfigurationAttribute {
            id: row.get(0)?,
            name: row.get(1)?,
            attribute_type,
            parent_id: row.get(3)?,
            resources: row.get(4)?,
            validator: row.get(5)?,
            dependencies: row.get(6)?,
            default_value: row.get(7)?,
        })
    }
}
