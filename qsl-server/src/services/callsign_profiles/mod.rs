pub mod callsign_profiles_schema;
pub mod callsign_profiles_service;
pub mod callsign_profiles_shared;

pub use callsign_profiles_service::CallsignProfilesService;
