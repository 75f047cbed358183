// ==========================================
// 考试配置版本管理引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表入口（布尔字段一律 INTEGER 0/1 编码，与外部存储格式保持一致）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启（级联删除依赖它）
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 安装引擎所需的全部表与索引（幂等）
///
/// 约束说明：
/// - `configuration` 的部分唯一索引保证每个节点最多一个 followup=1 草稿行，
///   openDraft 的并发正确性依赖此索引（见 VersionManager）
/// - `exam_template` 的部分唯一索引保证每个 (机构, 考试类型) 最多一个机构默认模板
/// - `configuration_value` 的三元唯一约束保证 (版本, 属性, 列表索引) 不重复
pub fn install_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS configuration_attribute (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          type TEXT NOT NULL CHECK(type IN (
            'TEXT', 'NUMBER', 'CHECKBOX', 'SINGLE_SELECTION',
            'MULTI_SELECTION', 'TABLE', 'COMPOSITE')),
          parent_id INTEGER REFERENCES configuration_attribute(id),
          resources TEXT,
          validator TEXT,
          dependencies TEXT,
          default_value TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_config_attribute_parent
          ON configuration_attribute(parent_id);

        CREATE TABLE IF NOT EXISTS configuration_node (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          institution_id INTEGER NOT NULL,
          template_id INTEGER,
          owner TEXT,
          name TEXT NOT NULL,
          description TEXT,
          type TEXT,
          status TEXT NOT NULL DEFAULT 'UNDER_CONSTRUCTION'
            CHECK(status IN ('UNDER_CONSTRUCTION', 'READY_TO_USE', 'ARCHIVED')),
          last_update_time TEXT NOT NULL,
          last_update_user TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_config_node_institution
          ON configuration_node(institution_id);

        CREATE TABLE IF NOT EXISTS configuration (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          institution_id INTEGER NOT NULL,
          configuration_node_id INTEGER NOT NULL
            REFERENCES configuration_node(id) ON DELETE CASCADE,
          version TEXT,
          version_date TEXT,
          followup INTEGER NOT NULL DEFAULT 0 CHECK(followup IN (0, 1))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_configuration_single_followup
          ON configuration(configuration_node_id) WHERE followup = 1;
        CREATE INDEX IF NOT EXISTS idx_configuration_node
          ON configuration(configuration_node_id);

        CREATE TABLE IF NOT EXISTS configuration_value (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          institution_id INTEGER NOT NULL,
          configuration_id INTEGER NOT NULL
            REFERENCES configuration(id) ON DELETE CASCADE,
          configuration_attribute_id INTEGER NOT NULL
            REFERENCES configuration_attribute(id),
          list_index INTEGER NOT NULL DEFAULT 0,
          value TEXT,
          UNIQUE(configuration_id, configuration_attribute_id, list_index)
        );
        CREATE INDEX IF NOT EXISTS idx_config_value_configuration
          ON configuration_value(configuration_id);

        CREATE TABLE IF NOT EXISTS exam_template (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          institution_id INTEGER NOT NULL,
          configuration_template_id INTEGER REFERENCES configuration_node(id),
          name TEXT NOT NULL,
          exam_type TEXT,
          supporter TEXT,
          indicator_templates TEXT,
          institutional_default INTEGER NOT NULL DEFAULT 0
            CHECK(institutional_default IN (0, 1))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_exam_template_institutional_default
          ON exam_template(institution_id, exam_type) WHERE institutional_default = 1;

        CREATE TABLE IF NOT EXISTS orientation (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          config_attribute_id INTEGER NOT NULL
            REFERENCES configuration_attribute(id),
          template_id INTEGER,
          view TEXT,
          group_label TEXT,
          x_position INTEGER NOT NULL DEFAULT 0,
          y_position INTEGER NOT NULL DEFAULT 0,
          width INTEGER NOT NULL DEFAULT 0,
          height INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_orientation_template
          ON orientation(template_id);

        CREATE TABLE IF NOT EXISTS exam_configuration_map (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          institution_id INTEGER NOT NULL,
          exam_id INTEGER NOT NULL,
          configuration_node_id INTEGER NOT NULL
            REFERENCES configuration_node(id),
          encrypt_secret TEXT,
          client_group_id INTEGER,
          UNIQUE(exam_id, configuration_node_id, client_group_id)
        );
        CREATE INDEX IF NOT EXISTS idx_exam_config_map_exam
          ON exam_configuration_map(exam_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
