//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use relayhub_app::ports::DeviceRepository;
use relayhub_domain::device::Device;
use relayhub_domain::error::{ConflictError, RelayError};
use relayhub_domain::id::DeviceId;
use relayhub_domain::state::DeviceState;
use relayhub_domain::time::Timestamp;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

pub(crate) fn decode_timestamp(row: &SqliteRow, column: &str) -> Result<Timestamp, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&chrono::Utc))
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let state: String = row.try_get("state")?;
        let online: bool = row.try_get("online")?;
        let attached_system_id: Option<String> = row.try_get("attached_system_id")?;

        let id = DeviceId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let state =
            DeviceState::from_str(&state).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Device {
            id,
            name,
            state,
            online,
            attached_system_id,
            created_at: decode_timestamp(row, "created_at")?,
            state_updated_at: decode_timestamp(row, "state_updated_at")?,
        }))
    }
}

const INSERT: &str = "INSERT INTO devices (id, name, state, online, attached_system_id, created_at, state_updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_BY_NAME: &str = "SELECT * FROM devices WHERE name = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY created_at, id";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";
const FLIP_ONLINE: &str = "UPDATE devices SET online = ? WHERE id = ? AND online != ?";
const EXISTS: &str = "SELECT COUNT(*) FROM devices WHERE id = ?";
const CONFIRM_STATE: &str =
    "UPDATE devices SET state = ?, state_updated_at = ? WHERE id = ? RETURNING *";

/// Map a unique-constraint failure to a conflict naming the clashing column.
/// Two concurrent creates can both pass the service's duplicate check.
fn insert_error(err: sqlx::Error, device: &Device) -> RelayError {
    let sqlx::Error::Database(db_err) = &err else {
        return StorageError::from(err).into();
    };
    if !db_err.is_unique_violation() {
        return StorageError::from(err).into();
    }
    let conflict = if db_err.message().contains("devices.name") {
        ConflictError {
            entity: "Device",
            field: "name",
            value: device.name.clone(),
        }
    } else {
        ConflictError {
            entity: "Device",
            field: "id",
            value: device.id.to_string(),
        }
    };
    conflict.into()
}

/// `SQLite`-backed device repository.
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, RelayError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(device.id.as_str())
                .bind(&device.name)
                .bind(device.state.as_str())
                .bind(device.online)
                .bind(&device.attached_system_id)
                .bind(device.created_at.to_rfc3339())
                .bind(device.state_updated_at.to_rfc3339())
                .execute(&pool)
                .await
                .map_err(|err| insert_error(err, &device))?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send {
        let pool = self.pool.clone();
        let name = name.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NAME)
                .bind(name)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, RelayError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, RelayError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id.as_str())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }

    fn set_online(
        &self,
        id: &DeviceId,
        online: bool,
    ) -> impl Future<Output = Result<Option<bool>, RelayError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            // Only a real transition writes, so the affected-row count tells
            // us the previous value.
            let flipped = sqlx::query(FLIP_ONLINE)
                .bind(online)
                .bind(id.as_str())
                .bind(online)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?
                .rows_affected();
            if flipped > 0 {
                return Ok(Some(!online));
            }

            let (count,): (i64,) = sqlx::query_as(EXISTS)
                .bind(id.as_str())
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok((count > 0).then_some(online))
        }
    }

    fn confirm_state(
        &self,
        id: &DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(CONFIRM_STATE)
                .bind(state.as_str())
                .bind(at.to_rfc3339())
                .bind(id.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }
}
