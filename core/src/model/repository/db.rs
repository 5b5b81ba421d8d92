use deadpool_diesel::sqlite::{Hook, Manager, Object};
use deadpool_diesel::Pool;
use diesel::connection::SimpleConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use eyre::{eyre, Context, Result};

pub(super) const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// The catalog is a single-writer store, but repository calls from phase 1
/// lookups can overlap, so a few connections are kept around.
const POOL_SIZE: usize = 4;

pub fn open_db_pool(sqlite_url: &str) -> Result<DbPool> {
    let manager = Manager::new(sqlite_url, deadpool_diesel::Runtime::Tokio1);
    let pool = Pool::builder(manager)
        .max_size(POOL_SIZE)
        .post_create(Hook::sync_fn(|conn, _| {
            let mut conn = conn.lock().unwrap();
            connection_setup(&mut conn).map_err(|_err| {
                deadpool::managed::HookError::StaticMessage(
                    "error configuring database connection",
                )
            })
        }))
        .build()
        .wrap_err("error creating database pool")?;
    Ok(DbPool::new(pool))
}

pub fn migrate(conn: &mut diesel::SqliteConnection) -> Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| eyre!("error running migrations: {}", err))?;
    Ok(())
}

fn connection_setup(conn: &mut diesel::SqliteConnection) -> Result<()> {
    conn.batch_execute(
        r#"
PRAGMA journal_mode = wal;
PRAGMA foreign_keys = on;
PRAGMA busy_timeout = 5000;
    "#,
    )?;
    Ok(())
}

#[cfg(test)]
pub fn open_in_memory_and_migrate() -> diesel::sqlite::SqliteConnection {
    use diesel::Connection;
    let mut conn = diesel::sqlite::SqliteConnection::establish(":memory:")
        .expect("error opening in memory db");
    connection_setup(&mut conn).expect("error configuring in memory db connection");
    migrate(&mut conn).expect("error running migrations on in memory connection");
    conn
}

/// Pool over a single in-memory connection, for job tests that go through
/// the pool api. One connection, one database.
#[cfg(test)]
pub async fn open_in_memory_pool_and_migrate() -> DbPool {
    let manager = Manager::new(":memory:", deadpool_diesel::Runtime::Tokio1);
    let pool = Pool::builder(manager)
        .max_size(1)
        .build()
        .expect("error creating test database pool");
    let pool = DbPool::new(pool);
    let conn = pool.get().await.expect("error getting test connection");
    conn.interact(|conn| {
        connection_setup(conn).expect("error configuring test connection");
        migrate(conn).expect("error running migrations on test connection");
    })
    .await
    .expect("test db setup interaction failed");
    pool
}

type SqlitePool = Pool<Manager>;

pub type PooledDbConn = deadpool_diesel::Connection<diesel::SqliteConnection>;
pub type DbConn = diesel::SqliteConnection;

#[derive(Clone)]
pub struct DbPool {
    pool: SqlitePool,
}

impl DbPool {
    pub(self) fn new(pool: SqlitePool) -> Self {
        DbPool { pool }
    }

    pub async fn get(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .wrap_err("could not acquire db connection")
    }
}
