use std::path::Path;

use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Loads `.env.test`, starts logging and creates a freshly migrated database at `url`.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

/// A url for a throwaway database in the system temp directory.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/sfe_test_store_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    migrate!("./src/db/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().expect("Database path is not valid UTF-8");
    if Sqlite::database_exists(p).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(p).await {
            warn!("🚀️ Error dropping database {p}: {e:?}");
        }
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {p}");
}
