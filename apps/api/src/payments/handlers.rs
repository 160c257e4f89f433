//! Axum route handlers for checkout and Stripe webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::job::spawn_analysis_job;
use crate::errors::AppError;
use crate::models::analysis::VideoAnalysis;
use crate::payments::webhook::{
    verify_signature, WebhookEvent, DEFAULT_TOLERANCE_SECS, PAYMENT_FAILED, PAYMENT_SUCCEEDED,
    SIGNATURE_HEADER,
};
use crate::payments::{PaymentError, PaymentIntent};
use crate::state::AppState;
use crate::store::AnalysisStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub analysis_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
}

/// POST /api/create-payment-intent
///
/// Creates a Stripe PaymentIntent for the analysis fee and links it to the
/// record. The client secret goes back to the browser for confirmation.
pub async fn handle_create_payment_intent(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentIntentRequest>,
) -> Result<Json<CreatePaymentIntentResponse>, AppError> {
    let analysis = state
        .store
        .get_analysis(req.analysis_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {} not found", req.analysis_id)))?;

    let intent = state
        .stripe
        .create_payment_intent(state.config.analysis_fee_cents, analysis.id)
        .await?;
    let client_secret = intent
        .client_secret
        .clone()
        .ok_or(PaymentError::MissingField("client_secret"))?;

    state
        .store
        .attach_payment_intent(analysis.id, &intent.id)
        .await?;

    info!("Payment intent {} created for analysis {}", intent.id, analysis.id);
    Ok(Json(CreatePaymentIntentResponse { client_secret }))
}

/// POST /api/webhook
///
/// Verifies the `Stripe-Signature` header when a webhook secret is
/// configured, then applies the event. A successful payment starts the
/// analysis job in the background.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = state.config.stripe_webhook_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".to_string()))?;
        let now = chrono::Utc::now().timestamp();
        verify_signature(&body, header, secret, now, DEFAULT_TOLERANCE_SECS)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let event =
        WebhookEvent::parse(&body).map_err(|e| AppError::Validation(e.to_string()))?;

    if let Some(record) = apply_event(state.store.as_ref(), &event).await? {
        info!("Payment confirmed; starting analysis {}", record.id);
        spawn_analysis_job(state.clone(), record);
    }

    Ok(Json(json!({ "received": true })))
}

/// Applies a webhook event to the store. Returns the record that moved to
/// `processing` and now needs an analysis run.
pub async fn apply_event(
    store: &dyn AnalysisStore,
    event: &WebhookEvent,
) -> Result<Option<VideoAnalysis>, AppError> {
    match event.event_type.as_str() {
        PAYMENT_SUCCEEDED => {
            let intent = event
                .payment_intent()
                .map_err(|e| AppError::Validation(e.to_string()))?;
            let Some(analysis_id) = resolve_analysis(store, &intent).await? else {
                warn!("Payment intent {} has no matching analysis", intent.id);
                return Ok(None);
            };
            let started = store.begin_processing(analysis_id).await?;
            if started.is_none() {
                debug!("Analysis {analysis_id} is not awaiting payment; event ignored");
            }
            Ok(started)
        }
        PAYMENT_FAILED => {
            let intent = event
                .payment_intent()
                .map_err(|e| AppError::Validation(e.to_string()))?;
            if let Some(analysis_id) = resolve_analysis(store, &intent).await? {
                store.mark_payment_failed(analysis_id).await?;
                info!("Payment failed for analysis {analysis_id}");
            }
            Ok(None)
        }
        other => {
            debug!("Ignoring webhook event {other}");
            Ok(None)
        }
    }
}

async fn resolve_analysis(
    store: &dyn AnalysisStore,
    intent: &PaymentIntent,
) -> Result<Option<Uuid>, AppError> {
    if let Some(id) = intent.analysis_id() {
        return Ok(Some(id));
    }
    Ok(store
        .find_by_payment_intent(&intent.id)
        .await?
        .map(|record| record.id))
}
