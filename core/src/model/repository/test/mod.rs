mod album;

use super::db;

pub fn test_conn() -> db::DbConn {
    db::open_in_memory_and_migrate()
}
