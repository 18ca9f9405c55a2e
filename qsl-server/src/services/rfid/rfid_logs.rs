use std::sync::Arc;

use qsl_store::RecordType;

use crate::services::adapters::TenantCrud;
use crate::services::VaultState;

use super::rfid_shared;

/// Audit log of tag and device operations. Entries are written by the
/// card and device services; clients can only read them.
pub fn rfid_logs_service(state: Arc<VaultState>) -> TenantCrud {
    TenantCrud::new(state, RecordType::RfidLog, "RFID log")
        .with_listing(rfid_shared::LOG_LISTING)
        .with_capabilities(rfid_shared::log_capabilities())
}
