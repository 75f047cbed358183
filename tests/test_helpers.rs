// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、属性目录播种等功能
// ==========================================
#![allow(dead_code)]

use exam_config_engine::db;
use exam_config_engine::domain::NewAttribute;
use exam_config_engine::engine::ConfigurationService;
use exam_config_engine::repository::ConfigurationAttributeRepository;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    exam_config_engine::logging::init_test();

    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::install_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接 (统一 PRAGMA)
pub fn open_shared_conn(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = db::open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 播种属性目录并构建引擎门面
///
/// 属性必须先于 ConfigurationService::new 落库, 目录在构建时装载
pub fn setup_service(
    attributes: &[NewAttribute],
) -> Result<(NamedTempFile, Arc<ConfigurationService>), Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let conn = open_shared_conn(&db_path)?;

    let attribute_repo = ConfigurationAttributeRepository::new(conn.clone());
    for attribute in attributes {
        attribute_repo.insert(attribute)?;
    }

    let service = Arc::new(ConfigurationService::new(conn)?);
    Ok((temp_file, service))
}

/// 按属性名查 id (目录快照)
pub fn attribute_id(service: &ConfigurationService, name: &str) -> i64 {
    service.catalog().get_by_name(name).unwrap().id
}
