use std::sync::Arc;

use qsl_core::{QslApp, QslService};
use serde_json::Value;

pub mod adapters;
pub mod auth;
pub mod callsign_associations;
pub mod callsign_profiles;
pub mod cards;
pub mod categories;
pub mod certificates;
pub mod eyeball_cards;
pub mod rfid;
pub mod sent_cards;
pub mod tags;
pub mod types;

pub use types::{VaultParams, VaultState};

pub type DynService = Arc<dyn QslService<Value, VaultParams>>;

/// Every service of the vault, keyed by mount path.
pub struct VaultServices {
    pub mounts: Vec<(&'static str, DynService)>,
}

fn mount(path: &'static str, service: DynService) -> (&'static str, DynService) {
    (path, service)
}

/// Build the services, register them and attach their hooks.
pub fn configure(app: &QslApp<Value, VaultParams>, state: Arc<VaultState>) -> anyhow::Result<VaultServices> {
    let cards = Arc::new(cards::CardsService::new(Arc::clone(&state)));

    let mounts = vec![
        mount("/api/auth", Arc::new(auth::AuthService::new(Arc::clone(&state)))),
        mount("/api/cards", cards.clone()),
        mount("/api/eyeball-cards", Arc::new(eyeball_cards::EyeballCardsService::new(cards))),
        mount("/api/sent-cards", Arc::new(sent_cards::SentCardsService::new(Arc::clone(&state)))),
        mount(
            "/api/callsign-profiles",
            Arc::new(callsign_profiles::CallsignProfilesService::new(Arc::clone(&state))),
        ),
        mount("/api/categories", Arc::new(categories::CategoriesService::new(Arc::clone(&state)))),
        mount("/api/tags", Arc::new(tags::TagsService::new(Arc::clone(&state)))),
        mount(
            "/api/certificates",
            Arc::new(certificates::CertificatesService::new(Arc::clone(&state))),
        ),
        mount(
            "/api/certificate-templates",
            Arc::new(certificates::CertificateTemplatesService::new(Arc::clone(&state))),
        ),
        mount("/api/rfid-devices", Arc::new(rfid::RfidDevicesService::new(Arc::clone(&state)))),
        mount("/api/rfid-logs", Arc::new(rfid::rfid_logs_service(Arc::clone(&state)))),
        mount(
            "/api/callsign-associations",
            Arc::new(callsign_associations::CallsignAssociationsService::new(Arc::clone(&state))),
        ),
    ];

    for (path, svc) in &mounts {
        let name = path.rsplit('/').next().unwrap_or(path);
        app.register_service(name, Arc::clone(svc));
    }

    auth::auth_shared::register_hooks(app, &state)?;
    cards::cards_shared::register_hooks(app, &state)?;
    eyeball_cards::eyeball_cards_shared::register_hooks(app, &state)?;
    sent_cards::sent_cards_shared::register_hooks(app, &state)?;
    callsign_profiles::callsign_profiles_shared::register_hooks(app, &state)?;
    categories::categories_shared::register_hooks(app, &state)?;
    tags::tags_shared::register_hooks(app, &state)?;
    certificates::certificates_shared::register_hooks(app, &state)?;
    rfid::rfid_shared::register_hooks(app, &state)?;
    callsign_associations::callsign_associations_shared::register_hooks(app, &state)?;

    Ok(VaultServices { mounts })
}
