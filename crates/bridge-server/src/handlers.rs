//! HTTP Handlers
//!
//! Two provisioning triggers converge on the same orchestrator call:
//! the signed Stripe webhook (push) and the post-redirect session
//! details query (pull). Either one may arrive first, and both may
//! arrive; the orchestrator's idempotence makes the order irrelevant.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use bridge_billing::{
    quote_cents, BillingError, BillingEvent, CheckoutOrder, BillingCycle, PaymentStatus, Plan,
    PRICE_TOLERANCE_CENTS,
};
use bridge_provision::{ProvisionError, ProvisioningRecord};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: String,
    pub billing_cycle: String,
    pub memory_mb: u32,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Storefront's displayed price, for drift detection only
    #[serde(default)]
    pub amount_cents: Option<i64>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Shaped for the storefront's redirect call, hence camelCase.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetails {
    pub server_id: Option<u64>,
    pub identifier: Option<String>,
    pub address: Option<String>,
    pub username: Option<String>,
    /// Present only when the panel account was created for this order
    pub password: Option<String>,
    pub ownership_defect: bool,
}

/// Shaped for the storefront's post-redirect status poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailsResponse {
    pub session_id: String,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub metadata: std::collections::HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerDetails>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create a hosted checkout session.
///
/// The charge is always the server-side quote; the storefront's
/// amount is compared against it only to flag display drift.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = order_from_request(payload);

    let session = state.gateway.create_checkout(&order).await.map_err(|e| {
        tracing::error!(error = %e, "Checkout session creation failed");
        billing_error_response(&e)
    })?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.checkout_url,
    }))
}

/// Stripe webhook: the push-side provisioning trigger.
///
/// Signature failures reject with 400. Once the event is verified the
/// response is an unconditional acknowledgment, so a provisioning
/// failure is not retried by redelivery storms; the pull path and the
/// failure note in billing metadata cover recovery.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing Stripe signature".into(),
                    code: "MISSING_SIGNATURE".into(),
                }),
            )
        })?;

    let event = state.gateway.parse_event(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Webhook signature verification failed");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid signature".into(),
                code: "INVALID_SIGNATURE".into(),
            }),
        )
    })?;

    match BillingEvent::from_event(&event) {
        BillingEvent::CheckoutCompleted { session } => {
            tracing::info!(
                session_id = %session.id,
                payment_status = session.status.as_str(),
                "Checkout completed event received"
            );
            if session.status == PaymentStatus::Paid {
                if let Err(e) = state.orchestrator.provision(&session).await {
                    tracing::error!(
                        session_id = %session.id,
                        error = %e,
                        "Webhook-triggered provisioning failed"
                    );
                }
            }
        }
        BillingEvent::PaymentFailed { session_id } => {
            tracing::warn!(session_id = %session_id, "Async payment failed");
        }
        BillingEvent::Other { event_type } => {
            tracing::debug!(event_type = %event_type, "Ignoring unhandled event type");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

/// Session details: the pull-side provisioning trigger.
///
/// The storefront polls this after the checkout redirect. A paid
/// session provisions (or returns the existing record); an unpaid one
/// reports its payment status and nothing else.
pub async fn session_details(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session = state.billing.fetch_session(&session_id).await.map_err(|e| {
        tracing::warn!(session_id = %session_id, error = %e, "Session fetch failed");
        billing_error_response(&e)
    })?;

    if session.status != PaymentStatus::Paid {
        return Ok(Json(SessionDetailsResponse {
            session_id: session.id.clone(),
            payment_status: session.status.as_str().to_string(),
            customer_email: session.contact_email().map(str::to_string),
            metadata: session.metadata.clone(),
            server: None,
        }));
    }

    let record = state.orchestrator.provision(&session).await.map_err(|e| {
        tracing::error!(session_id = %session_id, error = %e, "Pull-triggered provisioning failed");
        provision_error_response(&e)
    })?;

    Ok(Json(SessionDetailsResponse {
        session_id: session.id.clone(),
        payment_status: session.status.as_str().to_string(),
        customer_email: session.contact_email().map(str::to_string),
        metadata: session.metadata.clone(),
        server: Some(server_details(&record)),
    }))
}

/// Turn a storefront request into the order the gateway charges.
///
/// The charged amount is always the server-side quote. A
/// client-supplied price is compared against it only to flag display
/// drift; it never reaches the order.
fn order_from_request(payload: CheckoutRequest) -> CheckoutOrder {
    let plan = Plan::from_str(&payload.plan);
    let cycle = BillingCycle::from_str(&payload.billing_cycle);
    let amount_cents = quote_cents(plan, payload.memory_mb, cycle);

    if let Some(client_amount) = payload.amount_cents {
        if (client_amount - amount_cents).abs() > PRICE_TOLERANCE_CENTS {
            tracing::warn!(
                client_amount,
                quoted = amount_cents,
                plan = plan.as_str(),
                cycle = cycle.as_str(),
                memory_mb = payload.memory_mb,
                "Storefront price differs from server quote, charging the quote"
            );
        }
    }

    CheckoutOrder {
        plan,
        cycle,
        amount_cents,
        server_name: payload.server_name,
        memory_mb: payload.memory_mb,
        game_version: payload.version,
        customer_email: payload.email,
        success_url: payload.success_url,
        cancel_url: payload.cancel_url,
    }
}

fn server_details(record: &ProvisioningRecord) -> ServerDetails {
    ServerDetails {
        server_id: record.server_id,
        identifier: record.server_identifier.clone(),
        address: record.server_address.clone(),
        username: record.account_username.clone(),
        password: record.credentials.as_ref().map(|c| c.password.clone()),
        ownership_defect: record.ownership_defect,
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map billing failures to sanitized HTTP responses.
fn billing_error_response(e: &BillingError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match e {
        BillingError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        BillingError::Signature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        BillingError::Parse(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        _ if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "BILLING_UNAVAILABLE"),
        _ => (StatusCode::BAD_GATEWAY, "BILLING_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.user_message().to_string(),
            code: code.into(),
        }),
    )
}

/// Map provisioning failures to sanitized HTTP responses.
fn provision_error_response(e: &ProvisionError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match e {
        ProvisionError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        ProvisionError::MissingCustomerContact => (StatusCode::BAD_REQUEST, "MISSING_CONTACT"),
        ProvisionError::CapacityExceeded { .. } | ProvisionError::NoCapacity { .. } => {
            (StatusCode::CONFLICT, "CAPACITY_EXCEEDED")
        }
        _ if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "PANEL_UNAVAILABLE"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "PROVISION_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.user_message().to_string(),
            code: code.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_errors_map_to_conflict() {
        let (status, _) =
            provision_error_response(&ProvisionError::CapacityExceeded { current: 5, max: 5 });
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = provision_error_response(&ProvisionError::NoCapacity { node_id: 1 });
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_retryable_errors_map_to_service_unavailable() {
        let (status, body) =
            provision_error_response(&ProvisionError::DependencyTimeout("panel".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0.code, "PANEL_UNAVAILABLE");
    }

    #[test]
    fn test_unknown_session_maps_to_not_found() {
        let (status, _) =
            billing_error_response(&BillingError::SessionNotFound("cs_missing".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn checkout_request(amount_cents: Option<i64>) -> CheckoutRequest {
        CheckoutRequest {
            plan: "standard".into(),
            billing_cycle: "monthly".into(),
            memory_mb: 2048,
            server_name: None,
            version: None,
            email: Some("buyer@example.com".into()),
            amount_cents,
            success_url: "https://shop.example.com/done".into(),
            cancel_url: "https://shop.example.com/cancel".into(),
        }
    }

    #[test]
    fn test_tampered_client_price_never_reaches_the_charge() {
        // 2 GiB standard monthly quotes at 900 cents.
        let quoted = quote_cents(Plan::Standard, 2048, BillingCycle::Monthly);

        let order = order_from_request(checkout_request(Some(1)));
        assert_eq!(order.amount_cents, quoted);

        let order = order_from_request(checkout_request(Some(10_000_000)));
        assert_eq!(order.amount_cents, quoted);

        let order = order_from_request(checkout_request(None));
        assert_eq!(order.amount_cents, quoted);
    }

    #[test]
    fn test_agreeing_client_price_still_charges_the_quote() {
        let quoted = quote_cents(Plan::Standard, 2048, BillingCycle::Monthly);
        let order = order_from_request(checkout_request(Some(quoted + 1)));
        assert_eq!(order.amount_cents, quoted);
    }

    #[test]
    fn test_session_details_body_shape() {
        let body = SessionDetailsResponse {
            session_id: "cs_1".into(),
            payment_status: "paid".into(),
            customer_email: Some("buyer@example.com".into()),
            metadata: std::collections::HashMap::new(),
            server: Some(ServerDetails {
                server_id: Some(42),
                identifier: Some("ab12cd34".into()),
                address: Some("192.0.2.1:25565".into()),
                username: Some("player4821".into()),
                password: None,
                ownership_defect: false,
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sessionId"], "cs_1");
        assert_eq!(json["paymentStatus"], "paid");
        assert_eq!(json["customerEmail"], "buyer@example.com");
        assert!(json["metadata"].is_object());
        assert_eq!(json["server"]["serverId"], 42);
        assert_eq!(json["server"]["ownershipDefect"], false);
    }

    #[test]
    fn test_checkout_request_accepts_minimal_payload() {
        let payload: CheckoutRequest = serde_json::from_str(
            r#"{
                "plan": "standard",
                "billing_cycle": "quarterly",
                "memory_mb": 2048,
                "success_url": "https://shop.example.com/done",
                "cancel_url": "https://shop.example.com/cancel"
            }"#,
        )
        .unwrap();
        assert!(payload.server_name.is_none());
        assert!(payload.amount_cents.is_none());
    }
}
