//! qsl-store: document storage for the QSL card vault.
//!
//! - [`backend`]: the storage boundary and its memory / SQLite drivers
//! - [`records`]: collections and indexes of every record type
//! - [`SchemaRegistrar`]: attaches them to a fresh connection
//! - [`ConnectionRegistry`]: one registered connection per tenant database

pub mod backend;
pub mod error;
mod handle;
pub mod ids;
pub mod query;
pub mod records;
mod registrar;
mod registry;
pub mod uri;

pub use backend::{driver_for, CollectionSpec, DocumentStore, IndexSpec, MemoryDriver, StoreDriver};
#[cfg(feature = "sqlite")]
pub use backend::SqliteDriver;
pub use error::{registry_error, store_error, RegistryError, RegistryResult, StoreError, StoreResult};
pub use handle::{AdminHandle, Collection, TenantHandle};
pub use ids::{is_object_id, object_id, random_hex};
pub use query::{Condition, Document, Filter, Query, SortOrder, ID_FIELD};
pub use records::RecordType;
pub use registrar::SchemaRegistrar;
pub use registry::{ConnectionRegistry, DEFAULT_ADMIN_DATABASE};
pub use uri::StoreUri;
