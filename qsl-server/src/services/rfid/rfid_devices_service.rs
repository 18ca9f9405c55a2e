use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::RecordType;
use serde_json::{json, Value};
use tracing::info;

use crate::services::adapters::{into_document, now, require_id, TenantCrud};
use crate::services::{VaultParams, VaultState};

use super::rfid_events::{self, RfidEvent};
use super::rfid_shared;

pub struct RfidDevicesService {
    pub crud: TenantCrud,
}

impl RfidDevicesService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::RfidDevice, "RFID device")
                .with_listing(rfid_shared::DEVICE_LISTING)
                .with_capabilities(rfid_shared::device_capabilities()),
        }
    }

    /// Record the reader as (dis)connected. No hardware is touched.
    async fn set_connected(&self, ctx: &TenantContext, id: &str, connected: bool) -> Result<Value> {
        let tenant = self.crud.state.tenant(ctx).await?;
        let devices = tenant.rfid_devices();
        devices.require(id, "RFID device").await?;

        let ts = now();
        let (status, stamp, operation) = if connected {
            ("active", "lastConnected", "connect")
        } else {
            ("inactive", "lastDisconnected", "disconnect")
        };
        let mut changes = into_document(json!({
            "isConnected": connected,
            "status": status,
            "updatedAt": ts,
        }))?;
        changes.insert(stamp.to_string(), Value::String(ts));
        let device = devices
            .patch(id, changes)
            .await?
            .ok_or_else(|| QslError::not_found("RFID device not found").into_anyhow())?;

        rfid_events::record(
            &tenant,
            RfidEvent::new(operation)
                .device(id)
                .message(format!("Device {operation}ed")),
        )
        .await?;
        info!(tenant = %tenant.name(), device = %id, connected, "rfid device state changed");
        Ok(Value::Object(device))
    }

    async fn status(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let device = self.crud.require(ctx, id).await?;
        Ok(json!({
            "_id": id,
            "name": device.get("name"),
            "status": device.get("status"),
            "isConnected": device.get("isConnected").cloned().unwrap_or(Value::Bool(false)),
            "lastConnected": device.get("lastConnected"),
            "lastDisconnected": device.get("lastDisconnected"),
        }))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for RfidDevicesService {
    fn capabilities(&self) -> ServiceCapabilities {
        rfid_shared::device_capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        self.crud._create(ctx, data, params).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, mut data: Value, params: VaultParams) -> Result<Value> {
        let existing = self.crud.require(ctx, id).await?;
        if let Some(obj) = data.as_object_mut() {
            for key in ["isConnected", "lastConnected", "lastDisconnected"] {
                if let Some(v) = existing.get(key) {
                    obj.insert(key.to_string(), v.clone());
                }
            }
        }
        self.crud._update(ctx, id, data, params).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        self.crud._patch(ctx, id, data, params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        self.crud._remove(ctx, id, params).await
    }

    async fn custom(
        &self,
        ctx: &TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<Value>,
        params: VaultParams,
    ) -> Result<Value> {
        match method {
            "connect" => self.set_connected(ctx, require_id(id, "Device id is required")?, true).await,
            "disconnect" => self.set_connected(ctx, require_id(id, "Device id is required")?, false).await,
            "status" => self.status(ctx, require_id(id, "Device id is required")?).await,
            _ => self.crud._custom(ctx, method, id, data, params).await,
        }
    }
}
