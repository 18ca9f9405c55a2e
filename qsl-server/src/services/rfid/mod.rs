pub mod rfid_devices_schema;
pub mod rfid_devices_service;
pub mod rfid_events;
pub mod rfid_logs;
pub mod rfid_shared;
pub mod rfid_tags;

pub use rfid_devices_service::RfidDevicesService;
pub use rfid_logs::rfid_logs_service;
