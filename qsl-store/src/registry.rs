//! # Connection registry
//!
//! Keyed cache of tenant connections plus the administrative connection.
//!
//! Each tenant name maps to a slot whose `OnceCell` acts as its init barrier:
//! concurrent callers for one name wait on the same cell, so the database is
//! opened and registered once and every caller gets the same handle. The map
//! lock is only held to look up, insert or remove slots, never across an
//! `.await`.
//!
//! `close_tenant` and `close_all` mark the slots they remove as evicted. An
//! open still in flight on an evicted slot closes its connection when it
//! completes and never re-enters the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use qsl_core::TenantId;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::backend::{driver_for, DocumentStore, StoreDriver};
use crate::error::{RegistryError, RegistryResult, StoreError};
use crate::handle::{AdminHandle, TenantHandle};
use crate::registrar::SchemaRegistrar;
use crate::uri::StoreUri;

/// Used when the base URI names no database.
pub const DEFAULT_ADMIN_DATABASE: &str = "radio-card-system";

#[derive(Default)]
struct TenantSlot {
    cell: OnceCell<TenantHandle>,
    evicted: AtomicBool,
}

impl TenantSlot {
    fn evict(&self) {
        self.evicted.store(true, Ordering::SeqCst);
    }

    fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::SeqCst)
    }
}

type SlotRef = Arc<TenantSlot>;

enum Adoption {
    Ready(TenantHandle),
    Retry,
    /// Replaced by a newer slot; close this handle and try again.
    Orphaned(TenantHandle),
    /// Closed by `close_tenant`/`close_all` while opening.
    Evicted(TenantHandle),
}

pub struct ConnectionRegistry {
    driver: Arc<dyn StoreDriver>,
    base_uri: StoreUri,
    tenants: Mutex<HashMap<String, SlotRef>>,
    admin: Mutex<Arc<OnceCell<AdminHandle>>>,
}

impl ConnectionRegistry {
    pub fn new(driver: Arc<dyn StoreDriver>, base_uri: StoreUri) -> Self {
        Self {
            driver,
            base_uri,
            tenants: Mutex::new(HashMap::new()),
            admin: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// Registry with the driver matching the URI scheme.
    pub fn from_uri(uri: &str) -> RegistryResult<Self> {
        let invalid = |e: crate::error::StoreError| RegistryError::InvalidArgument(e.to_string());
        let base_uri = StoreUri::parse(uri).map_err(invalid)?;
        let driver = driver_for(&base_uri).map_err(invalid)?;
        Ok(Self::new(driver, base_uri))
    }

    pub fn base_uri(&self) -> &StoreUri {
        &self.base_uri
    }

    /// Name of the shared namespace holding users and counters.
    pub fn admin_database(&self) -> &str {
        self.base_uri.database().unwrap_or(DEFAULT_ADMIN_DATABASE)
    }

    /// Open the administrative connection on first call; later calls return it.
    pub async fn init_administrative(&self) -> RegistryResult<AdminHandle> {
        let cell = Arc::clone(&self.admin.lock());
        cell.get_or_try_init(|| self.open_administrative())
            .await
            .cloned()
    }

    pub fn administrative(&self) -> RegistryResult<AdminHandle> {
        self.admin
            .lock()
            .get()
            .cloned()
            .ok_or(RegistryError::NotInitialized)
    }

    /// Handle for `name`, opening and registering it on first use.
    pub async fn tenant(&self, name: &str) -> RegistryResult<TenantHandle> {
        let id = TenantId::new(name).ok_or_else(|| {
            RegistryError::InvalidArgument("tenant database name must not be blank".to_string())
        })?;
        let key = id.as_str().to_string();
        if key == self.admin_database() {
            return Err(RegistryError::InvalidArgument(format!(
                "`{key}` is the administrative database"
            )));
        }

        loop {
            let slot = {
                let mut map = self.tenants.lock();
                Arc::clone(map.entry(key.clone()).or_default())
            };

            let handle = match slot.cell.get_or_try_init(|| self.open_tenant(&key)).await {
                Ok(handle) => handle.clone(),
                Err(err) => {
                    let mut map = self.tenants.lock();
                    if map
                        .get(&key)
                        .is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.cell.initialized())
                    {
                        map.remove(&key);
                    }
                    return Err(err);
                }
            };

            match self.adopt(&key, &slot, handle) {
                Adoption::Ready(handle) => return Ok(handle),
                Adoption::Retry => continue,
                Adoption::Orphaned(handle) => {
                    handle.close().await;
                }
                Adoption::Evicted(handle) => {
                    handle.close().await;
                    debug!(tenant = %key, "open finished after the tenant was closed");
                    return Err(RegistryError::Connection {
                        database: key,
                        source: StoreError::Closed,
                    });
                }
            }
        }
    }

    fn adopt(&self, key: &str, slot: &SlotRef, handle: TenantHandle) -> Adoption {
        let mut map = self.tenants.lock();
        let current = map.get(key).cloned();

        if slot.is_evicted() {
            return Adoption::Evicted(handle);
        }

        if handle.is_closed() {
            if current.is_some_and(|s| Arc::ptr_eq(&s, slot)) {
                map.remove(key);
            }
            return Adoption::Retry;
        }

        match current {
            Some(s) if Arc::ptr_eq(&s, slot) => Adoption::Ready(handle),
            Some(_) => Adoption::Orphaned(handle),
            // Dropped by a failed open that this caller then completed.
            None => {
                map.insert(key.to_string(), Arc::clone(slot));
                Adoption::Ready(handle)
            }
        }
    }

    /// Close and forget one tenant connection. No-op when absent.
    pub async fn close_tenant(&self, name: &str) {
        let slot = {
            let mut map = self.tenants.lock();
            let slot = map.remove(name.trim());
            if let Some(slot) = &slot {
                slot.evict();
            }
            slot
        };
        if let Some(handle) = slot.as_ref().and_then(|s| s.cell.get()) {
            handle.close().await;
            info!(tenant = %handle.name(), "tenant connection closed");
        }
    }

    /// Close every connection and go back to the pre-init state.
    pub async fn close_all(&self) {
        let slots: Vec<SlotRef> = {
            let mut map = self.tenants.lock();
            map.drain()
                .map(|(_, slot)| {
                    slot.evict();
                    slot
                })
                .collect()
        };
        let admin = std::mem::replace(&mut *self.admin.lock(), Arc::new(OnceCell::new()));

        let mut closed = 0usize;
        for slot in &slots {
            if let Some(handle) = slot.cell.get() {
                handle.close().await;
                closed += 1;
            }
        }
        if let Some(handle) = admin.get() {
            handle.close().await;
        }
        info!(tenants = closed, "all connections closed");
    }

    /// Names with an open or opening connection.
    pub fn tenant_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tenants.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tenants.lock().contains_key(name.trim())
    }

    async fn open_tenant(&self, name: &str) -> RegistryResult<TenantHandle> {
        let store = self.connect(name).await?;
        if let Err(source) = SchemaRegistrar::register_all(&*store).await {
            store.close().await;
            warn!(tenant = %name, error = %source, "tenant registration failed");
            return Err(RegistryError::Registration {
                database: name.to_string(),
                source,
            });
        }
        info!(tenant = %name, "tenant connection ready");
        Ok(TenantHandle::new(name.to_string(), store))
    }

    async fn open_administrative(&self) -> RegistryResult<AdminHandle> {
        let name = self.admin_database().to_string();
        let store = self.connect(&name).await?;
        if let Err(source) = SchemaRegistrar::register_administrative(&*store).await {
            store.close().await;
            return Err(RegistryError::Registration {
                database: name,
                source,
            });
        }
        info!(database = %name, "administrative connection ready");
        Ok(AdminHandle::new(store))
    }

    async fn connect(&self, database: &str) -> RegistryResult<Arc<dyn DocumentStore>> {
        let uri = self.base_uri.with_database(database);
        debug!(database = %database, "opening connection");
        self.driver.connect(&uri).await.map_err(|source| {
            warn!(database = %database, error = %source, "connection failed");
            RegistryError::Connection {
                database: database.to_string(),
                source,
            }
        })
    }
}
