use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn vault() -> Router {
    let app = qsl_server::app::vault_app();
    app.set("auth.jwt.secret", "test-secret-for-the-vault");
    app.set("auth.bcrypt.cost", "4");
    app.set("store.uri", "memory://localhost/radio-card-system");
    qsl_server::build(app).await.unwrap().router()
}

async fn send(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (u16, Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let req = req
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status().as_u16();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Registers `username` with a callsign and returns its token.
async fn register(router: &Router, username: &str) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.org"),
            "password": "secret1",
            "callsign": username,
        })),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn default_profile(router: &Router, token: &str) -> String {
    let (status, body) = send(router, "GET", "/api/callsign-profiles/default", Some(token), None).await;
    assert_eq!(status, 200, "{body}");
    body["data"]["_id"].as_str().unwrap().to_string()
}

async fn create_card(router: &Router, token: &str, callsign: &str, extra: Value) -> Value {
    let profile = default_profile(router, token).await;
    let mut card = json!({
        "callsignProfile": profile,
        "callsign": callsign,
        "contactDate": "2024-05-01T10:00:00Z",
        "frequency": 14.074,
        "mode": "FT8",
    });
    if let (Some(card), Value::Object(extra)) = (card.as_object_mut(), extra) {
        card.extend(extra);
    }
    let (status, body) = send(router, "POST", "/api/cards", Some(token), Some(card)).await;
    assert_eq!(status, 201, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn first_account_initializes_the_system_once() {
    let router = vault().await;

    let (_, body) = send(&router, "GET", "/api/auth/init-status", None, None).await;
    assert_eq!(body["data"]["isInitialized"], false);

    let admin = json!({"username": "admin", "email": "admin@example.org", "password": "secret1"});
    let (status, body) = send(&router, "POST", "/api/auth/initialize", None, Some(admin.clone())).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"].get("password").is_none());

    let (status, body) = send(&router, "POST", "/api/auth/initialize", None, Some(admin)).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "System is already initialized");

    let (_, body) = send(&router, "GET", "/api/auth/init-status", None, None).await;
    assert_eq!(body["data"]["isInitialized"], true);
}

#[tokio::test]
async fn login_checks_the_password() {
    let router = vault().await;
    register(&router, "bg7xyz").await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/auth",
        None,
        Some(json!({"username": "bg7xyz", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, 201);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(&router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["username"], "bg7xyz");
    assert!(body["data"]["lastLogin"].is_string());

    let (status, body) = send(
        &router,
        "POST",
        "/api/auth",
        None,
        Some(json!({"username": "bg7xyz", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["message"], "Invalid credentials");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let router = vault().await;
    register(&router, "ba1aa").await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"username": "ba1aa", "email": "other@example.org", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "User already exists");
}

#[tokio::test]
async fn resources_need_a_token() {
    let router = vault().await;

    let (status, body) = send(&router, "GET", "/api/cards", None, None).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["name"], "NotAuthenticated");

    let (status, _) = send(&router, "GET", "/api/cards", Some("not-a-token"), None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn card_create_assigns_a_received_card_number() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let card = create_card(&router, &token, "ba1aa", json!({})).await;
    let number = card["cardNumber"].as_str().unwrap();
    assert_eq!(number.len(), 26);
    assert_eq!(&number[8..10], "RC");
    assert!(number[..8].chars().all(|c| c.is_ascii_digit()));
    assert_eq!(card["callsign"], "BA1AA");
    assert_eq!(card["qslStatus"], "pending");

    let (status, body) = send(&router, "GET", "/api/cards?search=ba1", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["meta"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let router = vault().await;
    let alice = register(&router, "bg7aaa").await;
    let bob = register(&router, "bg7bbb").await;

    let card = create_card(&router, &alice, "ba1aa", json!({})).await;
    let id = card["_id"].as_str().unwrap();

    let (_, body) = send(&router, "GET", "/api/cards", Some(&bob), None).await;
    assert_eq!(body["meta"]["pagination"]["total"], 0);

    let (status, _) = send(&router, "GET", &format!("/api/cards/{id}"), Some(&bob), None).await;
    assert_eq!(status, 404);

    let (status, _) = send(&router, "GET", &format!("/api/cards/{id}"), Some(&alice), None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn undeclared_methods_are_405() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let (status, _) = send(&router, "DELETE", "/api/rfid-logs/abc", Some(&token), None).await;
    assert_eq!(status, 405);

    let (status, body) = send(&router, "POST", "/api/cards/abc/launch", Some(&token), Some(json!({}))).await;
    assert_eq!(status, 405);
    assert_eq!(body["error"]["name"], "MethodNotAllowed");
}

#[tokio::test]
async fn sent_and_received_cards_link_both_ways() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let card = create_card(&router, &token, "BA1AA", json!({"qslStatus": "received"})).await;
    let card_id = card["_id"].as_str().unwrap();

    let (status, sent) = send(
        &router,
        "POST",
        "/api/sent-cards",
        Some(&token),
        Some(json!({
            "callsign": "ba1aa",
            "contactDate": "2024-05-01T10:00:00Z",
            "frequency": 14.074,
            "mode": "FT8",
        })),
    )
    .await;
    assert_eq!(status, 201, "{sent}");
    let sent_id = sent["data"]["_id"].as_str().unwrap();
    assert_eq!(&sent["data"]["cardNumber"].as_str().unwrap()[8..10], "TC");

    let (_, matches) = send(
        &router,
        "GET",
        &format!("/api/cards/{card_id}/find-matching-sent-cards"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(matches["data"].as_array().unwrap().len(), 1);

    let (status, linked) = send(
        &router,
        "POST",
        &format!("/api/cards/{card_id}/link-sent-card"),
        Some(&token),
        Some(json!({"sentCardId": sent_id})),
    )
    .await;
    assert_eq!(status, 200, "{linked}");
    assert_eq!(linked["data"]["qslStatus"], "confirmed");
    assert_eq!(linked["data"]["sentCard"], sent_id);

    let (_, sent) = send(&router, "GET", &format!("/api/sent-cards/{sent_id}"), Some(&token), None).await;
    assert_eq!(sent["data"]["isReceived"], true);
    assert_eq!(sent["data"]["receivedCard"], card_id);

    let (_, stats) = send(&router, "GET", "/api/sent-cards/stats", Some(&token), None).await;
    assert_eq!(stats["data"]["received"], 1);
    assert_eq!(stats["data"]["responseRate"], 100.0);
}

#[tokio::test]
async fn eyeball_cards_get_certificates() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;
    let profile = default_profile(&router, &token).await;

    let (status, eyeball) = send(
        &router,
        "POST",
        "/api/eyeball-cards",
        Some(&token),
        Some(json!({
            "callsignProfile": profile,
            "callsign": "ba1aa",
            "name": "Li <Wei>",
            "contactDate": "2024-05-01",
            "frequency": 0,
            "mode": "EYEBALL",
            "eyeballInfo": {"meetingType": "hamfest", "meetingLocation": "Shenzhen"},
        })),
    )
    .await;
    assert_eq!(status, 201, "{eyeball}");
    assert_eq!(eyeball["data"]["contactType"], "eyeball_offline");
    let card_id = eyeball["data"]["_id"].as_str().unwrap();

    let (status, cert) = send(
        &router,
        "POST",
        &format!("/api/certificates/{card_id}/eyeball"),
        Some(&token),
        Some(json!({"additionalInfo": "73"})),
    )
    .await;
    assert_eq!(status, 200, "{cert}");
    assert_eq!(cert["data"]["status"], "active");
    assert!(cert["data"].get("document").is_none());
    let cert_id = cert["data"]["_id"].as_str().unwrap();
    assert_eq!(
        cert["data"]["fileUrl"],
        format!("/api/certificates/{cert_id}/document")
    );

    let (_, doc) = send(
        &router,
        "GET",
        &format!("/api/certificates/{cert_id}/document"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(doc["data"]["contentType"], "text/html");
    let html = doc["data"]["content"].as_str().unwrap();
    assert!(html.contains("BA1AA"));
    assert!(html.contains("Li &lt;Wei&gt;"));
    assert!(html.contains("Shenzhen"));

    let (_, listed) = send(&router, "GET", "/api/certificates", Some(&token), None).await;
    assert!(listed["data"][0].get("document").is_none());

    let plain = create_card(&router, &token, "BD4XX", json!({})).await;
    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/certificates/{}/eyeball", plain["_id"].as_str().unwrap()),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "Card is not an eyeball card");
}

#[tokio::test]
async fn category_tree_rejects_cycles() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let (_, root) = send(&router, "POST", "/api/categories", Some(&token), Some(json!({"name": "DX"}))).await;
    let root_id = root["data"]["_id"].as_str().unwrap().to_string();
    assert_eq!(root["data"]["level"], 0);

    let (status, child) = send(
        &router,
        "POST",
        "/api/categories",
        Some(&token),
        Some(json!({"name": "Asia", "parentId": root_id})),
    )
    .await;
    assert_eq!(status, 201, "{child}");
    assert_eq!(child["data"]["level"], 1);
    let child_id = child["data"]["_id"].as_str().unwrap();

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/categories/{root_id}/move"),
        Some(&token),
        Some(json!({"parentId": child_id})),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = send(&router, "DELETE", &format!("/api/categories/{root_id}"), Some(&token), None).await;
    assert_eq!(status, 400);

    let (_, path) = send(&router, "GET", &format!("/api/categories/{child_id}/path"), Some(&token), None).await;
    let names: Vec<&str> = path["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["DX", "Asia"]);
}

#[tokio::test]
async fn tag_counts_follow_cards() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let (status, tag) = send(&router, "POST", "/api/tags", Some(&token), Some(json!({"name": "QRP", "count": 50}))).await;
    assert_eq!(status, 201, "{tag}");
    assert_eq!(tag["data"]["count"], 0);
    assert_eq!(tag["data"]["color"], "#1890ff");
    let tag_id = tag["data"]["_id"].as_str().unwrap();

    let card = create_card(&router, &token, "BA1AA", json!({"tags": [tag_id]})).await;
    let (_, tag) = send(&router, "GET", &format!("/api/tags/{tag_id}"), Some(&token), None).await;
    assert_eq!(tag["data"]["count"], 1);

    let (status, _) = send(&router, "POST", "/api/tags", Some(&token), Some(json!({"name": "QRP"}))).await;
    assert_eq!(status, 400);

    let (status, _) = send(&router, "DELETE", &format!("/api/tags/{tag_id}"), Some(&token), None).await;
    assert_eq!(status, 200);
    let card_id = card["_id"].as_str().unwrap();
    let (_, card) = send(&router, "GET", &format!("/api/cards/{card_id}"), Some(&token), None).await;
    assert_eq!(card["data"]["tags"], json!([]));
}

#[tokio::test]
async fn changing_the_password_issues_a_new_token() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let (status, _) = send(
        &router,
        "POST",
        "/api/auth/me/change-password",
        Some(&token),
        Some(json!({"currentPassword": "nope", "newPassword": "secret2"})),
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = send(
        &router,
        "POST",
        "/api/auth/me/change-password",
        Some(&token),
        Some(json!({"currentPassword": "secret1", "newPassword": "secret2"})),
    )
    .await;
    assert_eq!(status, 200);
    assert!(body["data"]["token"].is_string());

    let (status, _) = send(
        &router,
        "POST",
        "/api/auth",
        None,
        Some(json!({"username": "bg7xyz", "password": "secret2"})),
    )
    .await;
    assert_eq!(status, 201);
}

#[tokio::test]
async fn get_never_runs_a_writing_method() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let (status, device) = send(&router, "POST", "/api/rfid-devices", Some(&token), Some(json!({"name": "Desk reader"}))).await;
    assert_eq!(status, 201, "{device}");
    let device_id = device["data"]["_id"].as_str().unwrap();

    let (status, _) = send(&router, "GET", &format!("/api/rfid-devices/{device_id}/connect"), Some(&token), None).await;
    assert_eq!(status, 405);

    let (status, state) = send(&router, "GET", &format!("/api/rfid-devices/{device_id}/status"), Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(state["data"]["isConnected"], false);
    assert_eq!(state["data"]["status"], "inactive");

    let (_, logs) = send(&router, "GET", "/api/rfid-logs", Some(&token), None).await;
    assert_eq!(logs["meta"]["pagination"]["total"], 0);

    let (status, _) = send(&router, "GET", "/api/categories/move", Some(&token), None).await;
    assert_eq!(status, 405);

    let (status, _) = send(&router, "POST", &format!("/api/rfid-devices/{device_id}/connect"), Some(&token), None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn repeated_tags_count_once() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let (_, tag) = send(&router, "POST", "/api/tags", Some(&token), Some(json!({"name": "DX"}))).await;
    let tag_id = tag["data"]["_id"].as_str().unwrap();

    let card = create_card(&router, &token, "BA1AA", json!({"tags": [tag_id, tag_id]})).await;
    assert_eq!(card["tags"], json!([tag_id]));
    let (_, tag) = send(&router, "GET", &format!("/api/tags/{tag_id}"), Some(&token), None).await;
    assert_eq!(tag["data"]["count"], 1);

    let card_id = card["_id"].as_str().unwrap();
    let (status, _) = send(&router, "DELETE", &format!("/api/cards/{card_id}"), Some(&token), None).await;
    assert_eq!(status, 200);
    let (_, tag) = send(&router, "GET", &format!("/api/tags/{tag_id}"), Some(&token), None).await;
    assert_eq!(tag["data"]["count"], 0);
}

#[tokio::test]
async fn rfid_tags_span_received_and_sent_cards() {
    let router = vault().await;
    let token = register(&router, "bg7xyz").await;

    let card = create_card(&router, &token, "BA1AA", json!({})).await;
    let card_id = card["_id"].as_str().unwrap();
    let (status, sent) = send(
        &router,
        "POST",
        "/api/sent-cards",
        Some(&token),
        Some(json!({
            "callsign": "BD4XX",
            "contactDate": "2024-05-02T10:00:00Z",
            "frequency": 7.074,
            "mode": "FT8",
        })),
    )
    .await;
    assert_eq!(status, 201, "{sent}");
    let sent_id = sent["data"]["_id"].as_str().unwrap();

    let (status, linked) = send(
        &router,
        "POST",
        &format!("/api/cards/{card_id}/link-rfid"),
        Some(&token),
        Some(json!({"uid": "04A1B2C3"})),
    )
    .await;
    assert_eq!(status, 200, "{linked}");
    assert_eq!(linked["data"]["rfidTag"]["status"], "active");

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/sent-cards/{sent_id}/link-rfid"),
        Some(&token),
        Some(json!({"uid": "04A1B2C3"})),
    )
    .await;
    assert_eq!(status, 400);

    let (status, info) = send(&router, "GET", "/api/cards/rfid-tag?uid=04A1B2C3", Some(&token), None).await;
    assert_eq!(status, 200, "{info}");
    assert_eq!(info["data"]["cardInfo"]["callsign"], "BA1AA");
    assert_eq!(info["data"]["sentCardInfo"], Value::Null);
    assert_eq!(info["data"]["logs"][0]["operationType"], "link");

    let (status, _) = send(
        &router,
        "POST",
        "/api/cards/rfid-tag-status",
        Some(&token),
        Some(json!({"uid": "04A1B2C3", "status": "melted"})),
    )
    .await;
    assert_eq!(status, 400);
    let (status, updated) = send(
        &router,
        "POST",
        "/api/cards/rfid-tag-status",
        Some(&token),
        Some(json!({"uid": "04A1B2C3", "status": "lost"})),
    )
    .await;
    assert_eq!(status, 200, "{updated}");
    assert_eq!(updated["data"]["cardInfo"]["rfidTag"]["status"], "lost");

    let (status, _) = send(&router, "POST", &format!("/api/cards/{card_id}/unlink-rfid"), Some(&token), None).await;
    assert_eq!(status, 200);
    let (status, moved) = send(
        &router,
        "POST",
        &format!("/api/sent-cards/{sent_id}/link-rfid"),
        Some(&token),
        Some(json!({"uid": "04A1B2C3", "type": "MIFARE Classic"})),
    )
    .await;
    assert_eq!(status, 200, "{moved}");

    let (_, info) = send(&router, "GET", "/api/cards/rfid-tag?uid=04A1B2C3", Some(&token), None).await;
    assert_eq!(info["data"]["cardInfo"], Value::Null);
    assert_eq!(info["data"]["sentCardInfo"]["callsign"], "BD4XX");
    assert_eq!(info["data"]["logs"].as_array().unwrap().len(), 3);

    let (status, _) = send(&router, "GET", "/api/cards/rfid-tag?uid=FFFF", Some(&token), None).await;
    assert_eq!(status, 404);
}
