pub mod eyeball_cards_schema;
pub mod eyeball_cards_service;
pub mod eyeball_cards_shared;

pub use eyeball_cards_service::EyeballCardsService;
