use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use qsl_axum::axum;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslApp, QslService, ServiceCapabilities, ServiceMethodKind};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Logbook;

#[async_trait::async_trait]
impl QslService<Value, ()> for Logbook {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::from_methods(vec![
            ServiceMethodKind::Find,
            ServiceMethodKind::Get,
            ServiceMethodKind::Create,
        ])
        .with_read_custom(&["stats", "history"])
        .with_custom(&["qrcode"])
    }

    async fn find(&self, _ctx: &TenantContext, _params: ()) -> anyhow::Result<Page<Value>> {
        Ok(Page {
            data: vec![json!({"callsign": "BG7XYZ"}), json!({"callsign": "BA1AA"})],
            total: 12,
            page: 2,
            limit: 2,
        })
    }

    async fn get(&self, _ctx: &TenantContext, id: &str, _params: ()) -> anyhow::Result<Value> {
        if id == "missing" {
            return Err(QslError::not_found("Card not found").into_anyhow());
        }
        Ok(json!({"_id": id}))
    }

    async fn create(&self, _ctx: &TenantContext, data: Value, _params: ()) -> anyhow::Result<Value> {
        if data.get("callsign").is_none() {
            return Err(QslError::unprocessable("Invalid")
                .with_errors(json!({"callsign": ["required"]}))
                .into_anyhow());
        }
        if data["callsign"] == "BOOM" {
            return Err(anyhow::anyhow!("database exploded"));
        }
        Ok(data)
    }

    async fn custom(
        &self,
        _ctx: &TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<Value>,
        _params: (),
    ) -> anyhow::Result<Value> {
        Ok(json!({"method": method, "id": id, "data": data}))
    }
}

fn router() -> ::axum::Router {
    let app: QslApp<Value, ()> = QslApp::new();
    axum(app).use_service("/api/cards", Arc::new(Logbook)).router
}

fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap()
}

async fn send(req: Request<Body>) -> (u16, Value) {
    let res = router().oneshot(req).await.unwrap();
    let status = res.status().as_u16();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn find_wraps_pages_with_pagination_meta() {
    let (status, body) = send(request("GET", "/api/cards", None)).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["meta"]["pagination"],
        json!({"page": 2, "limit": 2, "total": 12, "pages": 6})
    );
}

#[tokio::test]
async fn create_answers_201_with_the_record() {
    let (status, body) = send(request("POST", "/api/cards", Some(r#"{"callsign":"BG7XYZ"}"#))).await;
    assert_eq!(status, 201);
    assert_eq!(body, json!({"success": true, "data": {"callsign": "BG7XYZ"}}));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (status, body) = send(request("POST", "/api/cards", Some(r#"{"callsign":"#))).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["name"], "BadRequest");
    assert_eq!(body["error"]["className"], "bad-request");
    assert!(body["error"].get("errors").is_some());
}

#[tokio::test]
async fn missing_body_is_a_bad_request() {
    let (status, body) = send(request("POST", "/api/cards", None)).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "Request body is required");
}

#[tokio::test]
async fn service_errors_keep_status_and_field_errors() {
    let (status, body) = send(request("POST", "/api/cards", Some("{}"))).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], 422);
    assert_eq!(body["error"]["errors"], json!({"callsign": ["required"]}));

    let (status, body) = send(request("GET", "/api/cards/missing", None)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["message"], "Card not found");
}

#[tokio::test]
async fn unexpected_errors_are_not_leaked() {
    let (status, body) = send(request("POST", "/api/cards", Some(r#"{"callsign":"BOOM"}"#))).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["name"], "GeneralError");
    assert_eq!(body["error"]["message"], "Internal server error");
}

#[tokio::test]
async fn undeclared_methods_are_405() {
    let (status, _) = send(request("DELETE", "/api/cards/abc", None)).await;
    assert_eq!(status, 405);

    let (status, body) = send(request("POST", "/api/cards/abc/launch", Some("{}"))).await;
    assert_eq!(status, 405);
    assert_eq!(body["error"]["name"], "MethodNotAllowed");
}

#[tokio::test]
async fn custom_methods_route_by_position() {
    let (_, body) = send(request("GET", "/api/cards/stats", None)).await;
    assert_eq!(body["data"], json!({"method": "stats", "id": null, "data": null}));

    let (_, body) = send(request("POST", "/api/cards/c1/qrcode", Some(r#"{"force":true}"#))).await;
    assert_eq!(
        body["data"],
        json!({"method": "qrcode", "id": "c1", "data": {"force": true}})
    );

    let (_, body) = send(request("GET", "/api/cards/c1/history", None)).await;
    assert_eq!(body["data"]["id"], "c1");

    let mut req = request("POST", "/api/cards", Some("{}"));
    req.headers_mut()
        .insert("x-service-method", HeaderValue::from_static("stats"));
    let (status, body) = send(req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["method"], "stats");
}

#[tokio::test]
async fn get_only_reaches_read_methods() {
    let (status, body) = send(request("GET", "/api/cards/c1/qrcode", None)).await;
    assert_eq!(status, 405);
    assert_eq!(body["error"]["name"], "MethodNotAllowed");

    let (status, _) = send(request("GET", "/api/cards/qrcode", None)).await;
    assert_eq!(status, 405);

    let (status, _) = send(request("GET", "/api/cards/c1/launch", None)).await;
    assert_eq!(status, 405);

    let (status, body) = send(request("GET", "/api/cards/stats", None)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["method"], "stats");
}

#[tokio::test]
async fn request_ids_are_generated_or_preserved() {
    let res = router()
        .oneshot(request("GET", "/api/cards", None))
        .await
        .unwrap();
    assert!(res.headers().get("x-request-id").is_some());

    let provided = HeaderValue::from_static("req-test-123");
    let mut req = request("GET", "/api/cards/abc", None);
    req.headers_mut().insert("x-request-id", provided.clone());
    let res = router().oneshot(req).await.unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}
