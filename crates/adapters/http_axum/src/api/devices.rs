//! JSON REST handlers for devices.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use relayhub_app::ports::{DeviceRepository, PendingCommandStore, Transport};
use relayhub_app::services::relay_service::StateChange;
use relayhub_domain::device::Device;
use relayhub_domain::id::DeviceId;
use relayhub_domain::state::DeviceState;
use relayhub_domain::time::Timestamp;

use crate::error::ApiError;
use crate::state::AppState;

const NOT_ACKNOWLEDGED: &str =
    "Device did not respond - command will be sent when device comes online";

/// Request body for creating a device.
#[derive(Deserialize)]
pub struct CreateDeviceRequest {
    pub device_uuid: String,
    pub name: String,
    pub attached_system_id: Option<String>,
}

/// Request body for switching a device.
#[derive(Deserialize)]
pub struct SetStateRequest {
    pub state: String,
}

/// Device as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub device_uuid: String,
    pub name: String,
    pub state: DeviceState,
    pub online: bool,
    pub attached_system_id: Option<String>,
    pub created_at: Timestamp,
    pub state_updated_at: Timestamp,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            device_uuid: device.id.to_string(),
            name: device.name,
            state: device.state,
            online: device.online,
            attached_system_id: device.attached_system_id,
            created_at: device.created_at,
            state_updated_at: device.state_updated_at,
        }
    }
}

/// Outcome of a state change request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetStateResponse {
    pub device_uuid: String,
    pub state: DeviceState,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<StateChange> for SetStateResponse {
    fn from(change: StateChange) -> Self {
        Self {
            device_uuid: change.device_id.to_string(),
            state: change.state,
            acknowledged: change.acknowledged,
            state_updated_at: change.state_updated_at,
            message: (!change.acknowledged).then(|| NOT_ACKNOWLEDGED.to_string()),
        }
    }
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<DeviceResponse>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<DeviceResponse>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<DeviceResponse>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Possible responses from the set-state endpoint.
pub enum SetStateResult {
    Ok(Json<SetStateResponse>),
}

impl IntoResponse for SetStateResult {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/devices`
pub async fn list<R, T, S>(
    State(state): State<AppState<R, T, S>>,
) -> Result<ListResponse, ApiError>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    let devices = state.relay.list_devices().await?;
    Ok(ListResponse::Ok(Json(
        devices.into_iter().map(DeviceResponse::from).collect(),
    )))
}

/// `GET /api/devices/{id}`
pub async fn get<R, T, S>(
    State(state): State<AppState<R, T, S>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    let device_id = DeviceId::from_str(&id)?;
    let device = state.relay.get_device(&device_id).await?;
    Ok(GetResponse::Ok(Json(device.into())))
}

/// `POST /api/devices`
pub async fn create<R, T, S>(
    State(state): State<AppState<R, T, S>>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<CreateResponse, ApiError>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    let mut builder = Device::builder().id(req.device_uuid).name(req.name);
    if let Some(system) = req.attached_system_id {
        builder = builder.attached_system_id(system);
    }

    let device = builder.build()?;
    let created = state.relay.create_device(device).await?;
    Ok(CreateResponse::Created(Json(created.into())))
}

/// `DELETE /api/devices/{id}`
pub async fn delete<R, T, S>(
    State(state): State<AppState<R, T, S>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    let device_id = DeviceId::from_str(&id)?;
    state.relay.delete_device(&device_id).await?;
    Ok(DeleteResponse::NoContent)
}

/// `PUT /api/devices/{id}/state`
///
/// Blocks until the device acknowledges or the ack timeout elapses.
pub async fn set_state<R, T, S>(
    State(state): State<AppState<R, T, S>>,
    Path(id): Path<String>,
    Json(req): Json<SetStateRequest>,
) -> Result<SetStateResult, ApiError>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    let device_id = DeviceId::from_str(&id)?;
    let desired = DeviceState::from_str(&req.state)?;
    let change = state.relay.set_device_state(&device_id, desired).await?;
    Ok(SetStateResult::Ok(Json(change.into())))
}
