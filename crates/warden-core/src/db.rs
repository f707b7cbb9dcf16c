use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use std::time::Duration;

use crate::config::Config;

/// Initialize the database connection from config.
///
/// Connection-level operations are bounded by the store timeout.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opts = ConnectOptions::new(&config.database_url);
    opts.connect_timeout(config.store_timeout())
        .acquire_timeout(config.store_timeout())
        .sqlx_logging(config.is_dev());

    if config.database_url.contains(":memory:") {
        // A single long-lived connection keeps the in-memory database alive.
        opts.max_connections(1).min_connections(1);
    } else {
        opts.max_connections(50)
            .min_connections(2)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800));
    }

    SeaDatabase::connect(opts).await
}
