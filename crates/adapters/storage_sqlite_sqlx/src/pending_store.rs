//! `SQLite` implementation of [`PendingCommandStore`].
//!
//! The unique index on `pending_commands(device_id)` backs up the
//! delete-then-insert in [`SqlitePendingStore::save_pending`]: a device never
//! has more than one row.

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use relayhub_app::ports::PendingCommandStore;
use relayhub_domain::error::RelayError;
use relayhub_domain::id::DeviceId;
use relayhub_domain::pending::PendingCommand;

use crate::device_repo::decode_timestamp;
use crate::error::StorageError;

struct Wrapper(PendingCommand);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let device_id: String = row.try_get("device_id")?;
        let payload: String = row.try_get("payload")?;

        let device_id =
            DeviceId::from_str(&device_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(PendingCommand {
            device_id,
            payload,
            created_at: decode_timestamp(row, "created_at")?,
        }))
    }
}

const DELETE_FOR_DEVICE: &str = "DELETE FROM pending_commands WHERE device_id = ?";
const INSERT: &str = "INSERT INTO pending_commands (device_id, payload, created_at) VALUES (?, ?, ?)";
const SELECT_FOR_DEVICE: &str =
    "SELECT device_id, payload, created_at FROM pending_commands WHERE device_id = ?";

/// `SQLite`-backed pending-command store.
#[derive(Clone)]
pub struct SqlitePendingStore {
    pool: SqlitePool,
}

impl SqlitePendingStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PendingCommandStore for SqlitePendingStore {
    fn save_pending(
        &self,
        command: &PendingCommand,
    ) -> impl Future<Output = Result<(), RelayError>> + Send {
        let pool = self.pool.clone();
        let command = command.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;

            let replaced = sqlx::query(DELETE_FOR_DEVICE)
                .bind(command.device_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            sqlx::query(INSERT)
                .bind(command.device_id.as_str())
                .bind(&command.payload)
                .bind(command.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;

            tx.commit().await.map_err(StorageError::from)?;
            if replaced > 0 {
                tracing::debug!(device_id = %command.device_id, "replaced older pending command");
            }
            Ok(())
        }
    }

    fn take_latest_pending(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<PendingCommand>, RelayError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_FOR_DEVICE)
                .bind(id.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn clear_pending(&self, id: &DeviceId) -> impl Future<Output = Result<u64, RelayError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let result = sqlx::query(DELETE_FOR_DEVICE)
                .bind(id.as_str())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayhub_app::ports::DeviceRepository;
    use relayhub_domain::device::Device;

    use crate::pool::{Config, Database};

    async fn setup() -> (Database, SqlitePendingStore) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        for (id, name) in [("AABBCCDDEEF1", "Garage relay"), ("AABBCCDDEEF2", "Porch light")] {
            db.devices()
                .create(Device::builder().id(id).name(name).build().unwrap())
                .await
                .unwrap();
        }
        let store = db.pending_commands();
        (db, store)
    }

    fn id(raw: &str) -> DeviceId {
        DeviceId::new(raw).unwrap()
    }

    async fn row_count(db: &Database, device: &str) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pending_commands WHERE device_id = ?")
                .bind(device)
                .fetch_one(db.pool())
                .await
                .unwrap();
        count
    }

    #[tokio::test]
    async fn should_keep_a_single_row_per_device() {
        let (db, store) = setup().await;
        let device = id("AABBCCDDEEF1");

        for n in 0..3 {
            store
                .save_pending(&PendingCommand::new(device.clone(), format!("cmd-{n}")))
                .await
                .unwrap();
        }

        assert_eq!(row_count(&db, "AABBCCDDEEF1").await, 1);
        let latest = store.take_latest_pending(&device).await.unwrap().unwrap();
        assert_eq!(latest.payload, "cmd-2");
    }

    #[tokio::test]
    async fn should_read_without_deleting() {
        let (db, store) = setup().await;
        let device = id("AABBCCDDEEF1");
        let command = PendingCommand::new(device.clone(), "cmd");
        store.save_pending(&command).await.unwrap();

        let first = store.take_latest_pending(&device).await.unwrap();
        assert_eq!(first, Some(command));
        assert_eq!(row_count(&db, "AABBCCDDEEF1").await, 1);
    }

    #[tokio::test]
    async fn should_clear_only_the_given_device() {
        let (db, store) = setup().await;
        store
            .save_pending(&PendingCommand::new(id("AABBCCDDEEF1"), "a"))
            .await
            .unwrap();
        store
            .save_pending(&PendingCommand::new(id("AABBCCDDEEF2"), "b"))
            .await
            .unwrap();

        assert_eq!(store.clear_pending(&id("AABBCCDDEEF1")).await.unwrap(), 1);
        assert_eq!(store.clear_pending(&id("AABBCCDDEEF1")).await.unwrap(), 0);
        assert_eq!(row_count(&db, "AABBCCDDEEF2").await, 1);
    }

    #[tokio::test]
    async fn should_return_none_when_nothing_pending() {
        let (_db, store) = setup().await;
        assert!(
            store
                .take_latest_pending(&id("AABBCCDDEEF1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn should_drop_pending_rows_with_their_device() {
        let (db, store) = setup().await;
        store
            .save_pending(&PendingCommand::new(id("AABBCCDDEEF1"), "cmd"))
            .await
            .unwrap();

        db.devices().delete(&id("AABBCCDDEEF1")).await.unwrap();

        assert_eq!(row_count(&db, "AABBCCDDEEF1").await, 0);
    }

    #[tokio::test]
    async fn should_reject_pending_command_for_unknown_device() {
        let (_db, store) = setup().await;
        let result = store
            .save_pending(&PendingCommand::new(id("UNKNOWN"), "cmd"))
            .await;
        assert!(matches!(result, Err(RelayError::Persistence(_))));
    }
}
