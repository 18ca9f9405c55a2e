//! REST routes of one service.
//!
//! | route                   | call                                              |
//! |-------------------------|---------------------------------------------------|
//! | `GET /`                 | find                                              |
//! | `POST /`                | create, or custom when `x-service-method` is set |
//! | `GET /{id}`             | read custom when `id` names a custom method, else get |
//! | `POST /{id}`            | collection-level custom method `id`               |
//! | `PUT /{id}`             | update                                            |
//! | `PATCH /{id}`           | patch                                             |
//! | `DELETE /{id}`          | remove                                            |
//! | `GET /{id}/{method}`    | item-level read custom method, no body            |
//! | `POST /{id}/{method}`   | item-level custom method                          |
//!
//! Requests start with an anonymous tenant; authentication hooks attach one.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use qsl_core::errors::QslError;
use qsl_core::{Page, Pagination, QslApp, ServiceHandle, ServiceMethodKind, TenantContext};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    params::{FromRestParams, RestParams},
    QslAxumError, QslAxumState,
};

/// Header selecting a collection-level custom method on `POST /`.
pub const SERVICE_METHOD_HEADER: &str = "x-service-method";

type QueryMap = HashMap<String, String>;

fn params_from<P: FromRestParams>(
    headers: &HeaderMap,
    query: QueryMap,
    method: &str,
    uri: &axum::http::Uri,
) -> P {
    P::from_rest_params(RestParams::from_parts("rest", headers, query, method, uri))
}

/// `None` for an empty body.
fn parse_body<R: DeserializeOwned>(body: &Bytes) -> Result<Option<R>, QslAxumError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|e| {
        QslError::bad_request("Failed to parse the request body as JSON")
            .with_errors(json!({"_schema": [e.to_string()]}))
            .into()
    })
}

fn require_body<R: DeserializeOwned>(body: &Bytes) -> Result<R, QslAxumError> {
    parse_body(body)?.ok_or_else(|| QslError::bad_request("Request body is required").into())
}

fn ensure_allowed<R, P>(svc: &ServiceHandle<R, P>, method: ServiceMethodKind) -> Result<(), QslAxumError>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    if svc.capabilities().allows(&method) {
        return Ok(());
    }
    Err(QslError::method_not_allowed(format!("Method not allowed: {}", method.name())).into())
}

/// `GET` only reaches custom methods declared as reads.
fn ensure_read<R, P>(svc: &ServiceHandle<R, P>, method: &str) -> Result<(), QslAxumError>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    if svc.capabilities().is_read(method) {
        return Ok(());
    }
    Err(QslError::method_not_allowed(format!("Method not allowed: GET {method}")).into())
}

fn to_value<R: Serialize>(record: R) -> Result<Value, QslAxumError> {
    serde_json::to_value(record).map_err(|e| QslAxumError(e.into()))
}

fn item_response<R: Serialize>(status: StatusCode, record: R) -> Result<Response, QslAxumError> {
    let data = to_value(record)?;
    Ok((status, Json(json!({"success": true, "data": data}))).into_response())
}

fn list_response<R: Serialize>(page: Page<R>) -> Result<Response, QslAxumError> {
    let pagination = Pagination::from(&page);
    let data = to_value(page.data)?;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "meta": {"pagination": pagination},
    }))
    .into_response())
}

pub fn service_router<R, P>(service_name: Arc<String>, app: QslApp<R, P>) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let state = QslAxumState { app };

    Router::new()
        .route(
            "/",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri| async move {
                    let params: P = params_from(&headers, query, "GET", &uri);

                    let svc = state.app.service(&service_name)?;
                    ensure_allowed(&svc, ServiceMethodKind::Find)?;
                    let page = svc.find(TenantContext::anonymous(), params).await?;
                    list_response(page)
                }
            })
            .post({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      body: Bytes| async move {
                    let custom = headers
                        .get(SERVICE_METHOD_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty());
                    let params: P = params_from(&headers, query, "POST", &uri);
                    let svc = state.app.service(&service_name)?;

                    if let Some(method) = custom {
                        let data = parse_body(&body)?;
                        let res = svc
                            .custom(TenantContext::anonymous(), &method, None, data, params)
                            .await?;
                        return item_response(StatusCode::OK, res);
                    }

                    ensure_allowed(&svc, ServiceMethodKind::Create)?;
                    let data = require_body(&body)?;
                    let res = svc.create(TenantContext::anonymous(), data, params).await?;
                    item_response(StatusCode::CREATED, res)
                }
            }),
        )
        .route(
            "/{id}",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let params: P = params_from(&headers, query, "GET", &uri);
                    let svc = state.app.service(&service_name)?;

                    let res = if svc.capabilities().custom_method(&id).is_some() {
                        ensure_read(&svc, &id)?;
                        svc.custom(TenantContext::anonymous(), &id, None, None, params)
                            .await?
                    } else {
                        ensure_allowed(&svc, ServiceMethodKind::Get)?;
                        svc.get(TenantContext::anonymous(), &id, params).await?
                    };
                    item_response(StatusCode::OK, res)
                }
            })
            .post({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path(method): Path<String>,
                      body: Bytes| async move {
                    let params: P = params_from(&headers, query, "POST", &uri);
                    let svc = state.app.service(&service_name)?;

                    let data = parse_body(&body)?;
                    let res = svc
                        .custom(TenantContext::anonymous(), &method, None, data, params)
                        .await?;
                    item_response(StatusCode::OK, res)
                }
            })
            .put({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      body: Bytes| async move {
                    let params: P = params_from(&headers, query, "PUT", &uri);
                    let svc = state.app.service(&service_name)?;
                    ensure_allowed(&svc, ServiceMethodKind::Update)?;

                    let data = require_body(&body)?;
                    let res = svc.update(TenantContext::anonymous(), &id, data, params).await?;
                    item_response(StatusCode::OK, res)
                }
            })
            .patch({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      body: Bytes| async move {
                    let params: P = params_from(&headers, query, "PATCH", &uri);
                    let svc = state.app.service(&service_name)?;
                    ensure_allowed(&svc, ServiceMethodKind::Patch)?;

                    let data = require_body(&body)?;
                    let res = svc
                        .patch(TenantContext::anonymous(), Some(&id), data, params)
                        .await?;
                    item_response(StatusCode::OK, res)
                }
            })
            .delete({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let params: P = params_from(&headers, query, "DELETE", &uri);
                    let svc = state.app.service(&service_name)?;
                    ensure_allowed(&svc, ServiceMethodKind::Remove)?;

                    let res = svc.remove(TenantContext::anonymous(), Some(&id), params).await?;
                    item_response(StatusCode::OK, res)
                }
            }),
        )
        .route(
            "/{id}/{method}",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path((id, method)): Path<(String, String)>| async move {
                    let params: P = params_from(&headers, query, "GET", &uri);
                    let svc = state.app.service(&service_name)?;
                    ensure_read(&svc, &method)?;

                    let res = svc
                        .custom(TenantContext::anonymous(), &method, Some(&id), None, params)
                        .await?;
                    item_response(StatusCode::OK, res)
                }
            })
            .post({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<QslAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<QueryMap>,
                      OriginalUri(uri): OriginalUri,
                      Path((id, method)): Path<(String, String)>,
                      body: Bytes| async move {
                    let params: P = params_from(&headers, query, "POST", &uri);
                    let svc = state.app.service(&service_name)?;

                    let data = parse_body(&body)?;
                    let res = svc
                        .custom(TenantContext::anonymous(), &method, Some(&id), data, params)
                        .await?;
                    item_response(StatusCode::OK, res)
                }
            }),
        )
        .with_state(state)
}
