pub mod cards_links;
pub mod cards_schema;
pub mod cards_service;
pub mod cards_shared;

pub use cards_service::CardsService;
