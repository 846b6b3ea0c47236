//! Request handlers for the catalog, the order wizard, the simple order
//! form and the admin order surface.

use crate::sanitize::{resolve_owned_id, truncate};
use crate::store::StoreError;
use crate::wizard::{self, FilePart, Step, StepOutcome, SubmittedForm, WizardContext};
use crate::AppState;
use axum::extract::{ConnectInfo, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde_json::json;
use stampdesk_model::OrderStatus;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use tracing::{error, info, warn};
use uuid::Uuid;

pub(crate) const SESSION_COOKIE: &str = "stampdesk_sid";

pub(crate) fn api_error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"code": code, "message": message}})),
    )
        .into_response()
}

fn store_failure(context: &str, e: &StoreError) -> Response {
    error!("{context}: {e}");
    api_error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "storage",
        "storage unavailable",
    )
}

fn not_found(message: &str) -> Response {
    api_error_response(StatusCode::NOT_FOUND, "not_found", message)
}

fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Returns the caller's session id, minting a fresh one when the cookie is
/// missing. The bool says whether a `Set-Cookie` must go out.
fn ensure_session(headers: &HeaderMap) -> (String, bool) {
    match session_from_headers(headers) {
        Some(sid) => (sid, false),
        None => (Uuid::new_v4().simple().to_string(), true),
    }
}

fn with_session_cookie(mut response: Response, session_id: &str, minted: bool) -> Response {
    if minted {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

/// Drains a multipart body into plain fields and file parts. Text decoding
/// is lossy on purpose; an unreadable body is a client error.
async fn read_form(mut multipart: Multipart) -> Result<SubmittedForm, Response> {
    let mut form = SubmittedForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("multipart body rejected: {e}");
                return Err(api_error_response(
                    StatusCode::BAD_REQUEST,
                    "bad_request",
                    "malformed form body",
                ));
            }
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if let Some(file_name) = field.file_name().map(str::to_string) {
            match field.bytes().await {
                Ok(bytes) => form.files.push(FilePart {
                    field: name,
                    file_name,
                    data: bytes.to_vec(),
                }),
                Err(e) => warn!(field = %name, "file part dropped: {e}"),
            }
        } else {
            match field.bytes().await {
                Ok(bytes) => {
                    form.fields
                        .insert(name, String::from_utf8_lossy(&bytes).into_owned());
                }
                Err(e) => warn!(field = %name, "text part dropped: {e}"),
            }
        }
    }
    Ok(form)
}

pub(crate) async fn healthz_handler() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

pub(crate) async fn catalog_handler(State(state): State<AppState>) -> Response {
    let categories = match state.store.categories_active().await {
        Ok(categories) => categories,
        Err(e) => return store_failure("catalog listing failed", &e),
    };
    let products = match state.store.products_active().await {
        Ok(products) => products,
        Err(e) => return store_failure("catalog listing failed", &e),
    };
    Json(json!({"categories": categories, "products": products})).into_response()
}

pub(crate) async fn catalog_category_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    let category = match state.store.category_by_slug(&slug).await {
        Ok(Some(category)) => category,
        Ok(None) => return not_found("unknown category"),
        Err(e) => return store_failure("category lookup failed", &e),
    };
    let products = match state.store.products_in_category(category.id).await {
        Ok(products) => products,
        Err(e) => return store_failure("category product listing failed", &e),
    };
    Json(json!({"category": category, "products": products})).into_response()
}

pub(crate) async fn wizard_view(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let ctx = match WizardContext::load(state.store.as_ref(), product_id).await {
        Ok(Some(ctx)) => ctx,
        Ok(None) => return not_found("unknown product"),
        Err(e) => return store_failure("wizard context load failed", &e),
    };
    let step = Step::from_query(query.get("step").map(String::as_str));
    let selected_layout = resolve_owned_id(query.get("layout_id").map(String::as_str), &ctx.layouts)
        .and_then(|id| ctx.layouts.iter().find(|l| l.id == id))
        .cloned();
    Json(json!({
        "product": ctx.product,
        "step": step.number(),
        "simplified": ctx.simplified,
        "skip_layout": ctx.layouts.is_empty(),
        "layouts": ctx.layouts,
        "price_options": ctx.price_options,
        "selected_layout": selected_layout,
        "error": query.get("error"),
    }))
    .into_response()
}

pub(crate) async fn wizard_submit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(product_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let rate = &state.config.rate_limit;
    if !state
        .limiter
        .allow(
            "order_product",
            &addr.ip().to_string(),
            rate.max_order_product,
            rate.window,
        )
        .await
    {
        return api_error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "too many order submissions",
        );
    }
    let ctx = match WizardContext::load(state.store.as_ref(), product_id).await {
        Ok(Some(ctx)) => ctx,
        Ok(None) => return not_found("unknown product"),
        Err(e) => return store_failure("wizard context load failed", &e),
    };
    let (session_id, minted) = ensure_session(&headers);
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let step = Step::from_query(query.get("step").map(String::as_str));
    let outcome = match step {
        Step::Collect => wizard::submit_collect(&state, &session_id, &ctx, &form).await,
        Step::Layout => wizard::submit_layout(&state, &session_id, &ctx, &form).await,
        Step::Checkout => match wizard::submit_checkout(&state, &session_id, &ctx, &form).await {
            Ok(outcome) => outcome,
            Err(e) => return store_failure("order insert failed", &e),
        },
    };

    let response = match outcome {
        StepOutcome::Redirect {
            step,
            layout_id,
            flag,
        } => {
            let mut target = format!("/order/product/{product_id}?step={step}");
            if let Some(id) = layout_id {
                target.push_str(&format!("&layout_id={id}"));
            }
            if let Some(flag) = flag {
                target.push_str(&format!("&error={flag}"));
            }
            Redirect::to(&target).into_response()
        }
        StepOutcome::Submitted { order_id } => {
            info!(order_id, product_id, "wizard order submitted");
            Redirect::to("/order/success").into_response()
        }
    };
    with_session_cookie(response, &session_id, minted)
}

pub(crate) async fn order_submit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    multipart: Multipart,
) -> Response {
    let rate = &state.config.rate_limit;
    if !state
        .limiter
        .allow("order", &addr.ip().to_string(), rate.max_order, rate.window)
        .await
    {
        return api_error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "too many order submissions",
        );
    }
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let limits = &state.config.limits;
    let name = truncate(form.value("name"), limits.name);
    let phone = truncate(form.value("phone"), limits.phone);
    if name.is_empty() || phone.is_empty() {
        return api_error_response(
            StatusCode::BAD_REQUEST,
            "validation",
            "name and phone are required",
        );
    }

    let file_path = match form.file("file") {
        Some(part) => state
            .uploads
            .save(&part.file_name, &part.data)
            .await
            .unwrap_or_default(),
        None => String::new(),
    };
    let order = stampdesk_model::NewOrder {
        name,
        phone,
        email: truncate(form.value("email"), limits.email),
        order_type: truncate(form.value("order_type"), limits.name),
        mount_type: truncate(form.value("mount_type"), limits.name),
        message: truncate(form.value("message"), limits.message),
        file_path,
        ..Default::default()
    };
    let order_id = match state.store.insert_order(order).await {
        Ok(id) => id,
        Err(e) => return store_failure("order insert failed", &e),
    };
    info!(order_id, "simple order submitted");
    crate::notify::dispatch_for_order(&state, order_id).await;
    Redirect::to("/order/success").into_response()
}

pub(crate) async fn order_success_handler() -> Response {
    Json(json!({
        "status": "accepted",
        "message": "Your order has been received. We will contact you shortly.",
    }))
    .into_response()
}

pub(crate) async fn admin_orders_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    // An unknown status filter means no filter, it never errors the listing.
    let status = query
        .get("status")
        .and_then(|raw| OrderStatus::parse(raw).ok());
    match state.store.orders(status).await {
        Ok(orders) => Json(json!({"orders": orders})).into_response(),
        Err(e) => store_failure("order listing failed", &e),
    }
}

pub(crate) async fn admin_order_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    let order = match state.store.order(id).await {
        Ok(Some(order)) => order,
        Ok(None) => return not_found("unknown order"),
        Err(e) => return store_failure("order lookup failed", &e),
    };
    let params: BTreeMap<String, String> =
        serde_json::from_str(&order.params_json).unwrap_or_default();
    Json(json!({"order": order, "params": params})).into_response()
}

pub(crate) async fn admin_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let raw = form.get("status").map(String::as_str).unwrap_or_default();
    let status = match OrderStatus::parse(raw) {
        Ok(status) => status,
        Err(e) => {
            return api_error_response(StatusCode::BAD_REQUEST, "validation", &e.to_string());
        }
    };
    match state.store.update_order_status(id, status).await {
        Ok(true) => {
            info!(order_id = id, status = %status, "order status updated");
            Json(json!({"order_id": id, "status": status})).into_response()
        }
        Ok(false) => not_found("unknown order"),
        Err(e) => store_failure("order status update failed", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_extracted_from_header_soup() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; stampdesk_sid=abc123; lang=ru"),
        );
        assert_eq!(session_from_headers(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn missing_or_empty_cookie_mints_a_session() {
        let headers = HeaderMap::new();
        let (sid, minted) = ensure_session(&headers);
        assert!(minted);
        assert_eq!(sid.len(), 32);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("stampdesk_sid="));
        let (_, minted) = ensure_session(&headers);
        assert!(minted);
    }
}
