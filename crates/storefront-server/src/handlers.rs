//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use storefront_core::gateway::{
    CardDetails, CardMetadataService, CardProbeResult, PaymentDetails, PaymentGateway, PaymentLink,
    PaymentSession, TokenizedCard, Tokenizer,
};
use storefront_core::StorefrontError;
use storefront_core::handoff::PaymentPayload;
use storefront_payments::{ApiError as ErrorResponse, CardMetadataRequest, PaymentLedger, SIGNATURE_HEADER, WebhookEvent};

use crate::state::{AppState, PaymentServices};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub processor_configured: bool,
    pub webhooks_configured: bool,
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.into(),
        }),
    )
}

/// Processor messages pass through untouched
fn api_error(err: StorefrontError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        StorefrontError::Handoff(body) => error(StatusCode::BAD_GATEWAY, "PROCESSOR_ERROR", body),
        StorefrontError::Probe(message) => error(StatusCode::BAD_GATEWAY, "PROBE_FAILED", message),
        StorefrontError::Tokenization { code, message } => error(StatusCode::UNPROCESSABLE_ENTITY, &code, message),
        StorefrontError::Validation(fields) => error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", fields.to_string()),
        other => {
            tracing::error!(error = %other, "Request failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", other.user_message())
        }
    }
}

fn services(state: &AppState) -> Result<&PaymentServices, (StatusCode, Json<ErrorResponse>)> {
    state.payments.as_ref().ok_or_else(|| {
        error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })
}

fn check_payload(payload: &PaymentPayload) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if payload.amount_minor_units <= 0 {
        return Err(error(StatusCode::BAD_REQUEST, "INVALID_AMOUNT", "amount must be positive"));
    }
    if payload.reference.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "MISSING_REFERENCE", "reference is required"));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        processor_configured: state.payments.is_some(),
        webhooks_configured: state.webhook_secret.is_some(),
    })
}

/// Hosted payment page link
pub async fn create_payment_link(
    State(state): State<AppState>,
    Json(payload): Json<PaymentPayload>,
) -> ApiResult<PaymentLink> {
    let services = services(&state)?;
    check_payload(&payload)?;

    let link = services.gateway.create_payment_link(&payload).await.map_err(|e| {
        tracing::warn!(reference = %payload.reference, error = %e, "Payment link failed");
        api_error(e)
    })?;
    Ok(Json(link))
}

/// Session for the embedded widget
pub async fn create_payment_session(
    State(state): State<AppState>,
    Json(payload): Json<PaymentPayload>,
) -> ApiResult<PaymentSession> {
    let services = services(&state)?;
    check_payload(&payload)?;

    let session = services.gateway.create_payment_session(&payload).await.map_err(|e| {
        tracing::warn!(reference = %payload.reference, error = %e, "Payment session failed");
        api_error(e)
    })?;
    Ok(Json(session))
}

/// BIN / card metadata lookup
pub async fn card_metadata(
    State(state): State<AppState>,
    Json(request): Json<CardMetadataRequest>,
) -> ApiResult<CardProbeResult> {
    let services = services(&state)?;

    let digits = storefront_core::eligibility::card_digits(&request.pan_or_bin);
    if digits.len() < request.kind.min_digits() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "TOO_FEW_DIGITS",
            format!("at least {} digits required", request.kind.min_digits()),
        ));
    }

    let result = services
        .card_metadata
        .probe_card_metadata(&digits, request.kind)
        .await
        .map_err(api_error)?;
    Ok(Json(result))
}

/// Card tokenization
pub async fn tokenize_card(
    State(state): State<AppState>,
    Json(card): Json<CardDetails>,
) -> ApiResult<TokenizedCard> {
    let services = services(&state)?;
    let token = services.tokenizer.tokenize_card(&card).await.map_err(api_error)?;
    Ok(Json(token))
}

/// Payment status and stored identifiers
pub async fn payment_details(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> ApiResult<PaymentDetails> {
    let services = services(&state)?;
    let details = services
        .gateway
        .fetch_payment_details(&payment_id)
        .await
        .map_err(api_error)?;
    Ok(Json(details))
}

/// Processor webhook
pub async fn processor_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let secret = state.webhook_secret.as_deref().ok_or_else(|| {
        error(
            StatusCode::SERVICE_UNAVAILABLE,
            "WEBHOOKS_DISABLED",
            "Webhook secret not configured",
        )
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "MISSING_SIGNATURE", "Missing webhook signature"))?;

    let event = state.webhooks.parse_event(&body, signature, secret).map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        error(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature")
    })?;

    let handled = state.webhooks.handle(event).await.map_err(|e| {
        tracing::error!(error = %e, "Webhook processing error");
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "WEBHOOK_ERROR",
            "Webhook processing failed",
        )
    })?;

    if let WebhookEvent::PaymentCaptured { payment_id, .. } = &handled {
        if let Ok(Some(record)) = state.webhooks.ledger().get(payment_id) {
            tracing::info!(payment_id = %record.payment_id, reference = ?record.reference, "Payment settled");
        }
    }

    Ok(StatusCode::OK)
}
