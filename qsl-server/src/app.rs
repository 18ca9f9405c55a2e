use qsl_core::QslApp;
use serde_json::Value;

use crate::services::VaultParams;

/// App with the built-in defaults; `config::config` overrides them from the environment.
pub fn vault_app() -> QslApp<Value, VaultParams> {
    let app: QslApp<Value, VaultParams> = QslApp::new();
    app.set("http.host", "127.0.0.1");
    app.set("http.port", "5000");
    app.set("store.uri", "memory://localhost/radio-card-system");
    app.set("auth.jwt.expires_in", "7d");
    app.set("auth.bcrypt.cost", "10");
    app.set("paginate.default", "10");
    app.set("paginate.max", "100");
    app
}
