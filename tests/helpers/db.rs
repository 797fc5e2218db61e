use casbin_datastore::adapter::{Adapter, AdapterConfig};
use casbin_datastore::datastore::SqlDatastore;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tempfile::NamedTempFile;

/// Migrated SQLite file holding `rule_records`, removed on drop.
pub struct TestDb {
    connection: DatabaseConnection,
    url: String,
    _temp_file: NamedTempFile,
}

impl TestDb {
    pub async fn new() -> Self {
        let file = NamedTempFile::new().expect("Failed to create policy database file");
        let url = format!("sqlite://{}?mode=rwc", file.path().display());

        let connection = Database::connect(&url)
            .await
            .expect("Failed to open policy database");
        Migrator::up(&connection, None)
            .await
            .expect("Failed to create rule_records");

        Self {
            connection,
            url,
            _temp_file: file,
        }
    }

    /// Pool used for migrations; adapters open their own.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// A store on its own pool, so closing it leaves other stores usable.
    pub async fn store(&self) -> SqlDatastore {
        SqlDatastore::connect(&self.url)
            .await
            .expect("Failed to open store")
    }

    pub async fn adapter(&self, config: AdapterConfig) -> Adapter<SqlDatastore> {
        Adapter::with_config(self.store().await, config)
    }
}

/// Adapter config for a kind/namespace pair, everything else default.
pub fn partition_config(kind: &str, namespace: &str) -> AdapterConfig {
    AdapterConfig {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        ..Default::default()
    }
}
