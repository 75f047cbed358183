// ==========================================
// ExamTemplateRepository - 考试模板仓储
// ==========================================
// 机构默认唯一性由 idx_exam_template_institutional_default 部分唯一索引保证

use crate::domain::template::{ExamTemplate, NewTemplate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ExamTemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "id, institution_id, configuration_template_id, name, exam_type, \
     supporter, indicator_templates, institutional_default";

impl ExamTemplateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建模板, 返回分配的 id
    ///
    /// 同 (机构, 考试类型) 下第二个机构默认模板会触发唯一约束违反
    pub fn insert(&self, template: &NewTemplate) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO exam_template (
                institution_id, configuration_template_id, name, exam_type,
                supporter, indicator_templates, institutional_default
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &template.institution_id,
                &template.configuration_template_id,
                &template.name,
                &template.exam_type,
                &template.supporter,
                &template.indicator_templates,
                template.institutional_default as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询模板
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ExamTemplate>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM exam_template WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询机构的全部模板
    pub fn find_by_institution(&self, institution_id: i64) -> RepositoryResult<Vec<ExamTemplate>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exam_template WHERE institution_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let templates = stmt
            .query_map(params![institution_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(templates)
    }

    /// 查询 (机构, 考试类型) 的机构默认模板
    pub fn institutional_default_for(
        &self,
        institution_id: i64,
        exam_type: &str,
    ) -> RepositoryResult<Option<ExamTemplate>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM exam_template \
                     WHERE institution_id = ? AND exam_type = ? AND institutional_default = 1",
                    SELECT_COLUMNS
                ),
                params![institution_id, exam_type],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 更新模板
    pub fn update(&self, template: &ExamTemplate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE exam_template
               SET configuration_template_id = ?, name = ?, exam_type = ?,
                   supporter = ?, indicator_templates = ?, institutional_default = ?
               WHERE id = ?"#,
            params![
                &template.configuration_template_id,
                &template.name,
                &template.exam_type,
                &template.supporter,
                &template.indicator_templates,
                template.institutional_default as i64,
                &template.id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "exam_template".to_string(),
                id: template.id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除模板
    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM exam_template WHERE id = ?", params![id])?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "exam_template".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ExamTemplate> {
        Ok(ExamTemplate {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            configuration_template_id: row.get(2)?,
            name: row.get(3)?,
            exam_type: row.get(4)?,
            supporter: row.get(5)?,
            indicator_templates: row.get(6)?,
            institutional_default: row.get::<_, i64>(7)? != 0,
        })
    }
}
