pub mod callsign_associations_schema;
pub mod callsign_associations_service;
pub mod callsign_associations_shared;

pub use callsign_associations_service::CallsignAssociationsService;
