pub mod sent_cards_schema;
pub mod sent_cards_service;
pub mod sent_cards_shared;

pub use sent_cards_service::SentCardsService;
