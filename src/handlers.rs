use crate::config::Config;
use crate::crm_handler;
use crate::eligibility;
use crate::errors::{AppError, ResultExt};
use crate::intake::{self, ValidatedSubmission};
use crate::kommo_client::KommoClient;
use crate::lead_registry::LeadRegistry;
use crate::models::{CepLookupResponse, DecisionResponse, PreQualificationRequest};
use crate::notifications;
use crate::rate_limiter::SlidingWindowRateLimiter;
use crate::services::{
    build_cep_cache, build_http_client, CepCache, CepLookupService, EmailService, OutgoingEmail,
    WhatsAppService,
};
use crate::validation::normalize_cep;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

/// Largest accepted request body: a 7 MB bill in base64 plus the form fields.
pub const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Shared HTTP client for CEP lookup, e-mail and WhatsApp.
    pub http: reqwest::Client,
    /// Resolved postal codes (24 hour TTL).
    pub cep_cache: CepCache,
    /// Kommo CRM client (None when not configured).
    pub kommo: Option<KommoClient>,
    /// Per-source quota for the CRM submission endpoint.
    pub crm_rate_limiter: Arc<SlidingWindowRateLimiter>,
    /// Recently forwarded applicants, for duplicate detection.
    pub registry: LeadRegistry,
}

impl AppState {
    /// Builds the state with fresh, isolated limiter/registry/cache instances.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let kommo = KommoClient::from_config(&config)?;
        let crm_rate_limiter = Arc::new(SlidingWindowRateLimiter::new(
            config.crm_rate_limit_max,
            Duration::from_secs(config.crm_rate_limit_window_secs),
        ));

        Ok(Self {
            http: build_http_client()?,
            cep_cache: build_cep_cache(),
            kommo,
            crm_rate_limiter,
            registry: LeadRegistry::default(),
            config,
        })
    }

    fn cep_service(&self) -> CepLookupService {
        CepLookupService::new(&self.config, self.http.clone(), self.cep_cache.clone())
    }
}

/// Full application router: health check plus the API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_router(state))
}

/// API routes with body limits. IP rate limiting and tracing are layered on
/// by the binary.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .route(
            "/api/v1/pre-qualification",
            post(submit_pre_qualification),
        )
        .route("/api/v1/eligibility/evaluate", post(evaluate_eligibility))
        .route("/api/v1/cep/:cep", get(lookup_cep))
        .route("/api/v1/crm/leads", post(crm_handler::submit_crm_lead))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "solar-leads-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Serves the OpenAPI specification YAML file.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Solar Leads API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// GET /api/v1/cep/{cep}
///
/// Resolves a postal code for form auto-fill.
pub async fn lookup_cep(
    State(state): State<Arc<AppState>>,
    Path(cep): Path<String>,
) -> Result<Json<CepLookupResponse>, AppError> {
    let normalized = normalize_cep(&cep)
        .ok_or_else(|| AppError::BadRequest("CEP must have 8 digits".to_string()))?;

    state
        .cep_service()
        .lookup(&normalized)
        .await
        .context("CEP lookup")?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("CEP {} not found", normalized)))
}

/// POST /api/v1/eligibility/evaluate
///
/// Simulator: validates and evaluates without forwarding the lead anywhere.
pub async fn evaluate_eligibility(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreQualificationRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    let submission = intake::validate_submission(
        payload,
        &state.cep_service(),
        state.config.accept_legacy_phone_length,
    )
    .await?;

    let decision = eligibility::evaluate(&submission.eligibility_input());
    tracing::info!(
        "Simulated eligibility: status={}, priority={:?}",
        decision.status.label(),
        decision.priority
    );

    Ok(Json(DecisionResponse::new(
        Uuid::new_v4(),
        decision,
        submission.municipality,
        false,
    )))
}

/// POST /api/v1/pre-qualification
///
/// Flow:
/// 1. Validate and normalize the form (CEP resolved via lookup).
/// 2. Evaluate eligibility.
/// 3. Claim the document in the registry; skip forwarding if it was
///    forwarded recently. Invalid documents are never claimed.
/// 4. Send the lead e-mail (failure releases the claim and fails the request).
/// 5. WhatsApp alert and CRM sync (failures are logged only).
pub async fn submit_pre_qualification(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreQualificationRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    let submission = intake::validate_submission(
        payload,
        &state.cep_service(),
        state.config.accept_legacy_phone_length,
    )
    .await?;

    let decision = eligibility::evaluate(&submission.eligibility_input());
    let submission_id = Uuid::new_v4();

    tracing::info!(
        "📨 Pre-qualification {}: document={}, status={}, priority={:?}, score={}",
        submission_id,
        submission.masked_document(),
        decision.status.label(),
        decision.priority,
        decision.score
    );

    // Only a valid tax identifier identifies an applicant.
    let claimed = submission.document_valid;
    if claimed {
        if let Some(seen_at) = state.registry.claim(&submission.document).await {
            tracing::warn!(
                "⚠️  Duplicate submission for document {} (first forwarded at {})",
                submission.masked_document(),
                seen_at
            );
            return Ok(Json(DecisionResponse::new(
                submission_id,
                decision,
                submission.municipality,
                true,
            )));
        }
    }

    if let Err(e) = send_lead_email(&state, submission_id, &submission, &decision).await {
        if claimed {
            state.registry.release(&submission.document).await;
        }
        return Err(e);
    }

    let (whatsapp, crm) = tokio::join!(
        notify_sales_team(&state, &submission, &decision),
        sync_with_crm(&state, &submission, &decision),
    );
    if let Err(e) = whatsapp {
        tracing::warn!("WhatsApp notification skipped/failed: {}", e);
    }
    if let Err(e) = crm {
        tracing::warn!("CRM sync failed for submission {}: {}", submission_id, e);
    }

    Ok(Json(DecisionResponse::new(
        submission_id,
        decision,
        submission.municipality,
        false,
    )))
}

async fn send_lead_email(
    state: &AppState,
    submission_id: Uuid,
    submission: &ValidatedSubmission,
    decision: &eligibility::EligibilityDecision,
) -> Result<(), AppError> {
    let email_service = EmailService::new(&state.config, state.http.clone())?;
    let outgoing = OutgoingEmail {
        subject: notifications::email_subject(submission, decision),
        html: notifications::email_html(submission_id, chrono::Utc::now(), submission, decision),
        reply_to: submission
            .email_valid
            .then_some(submission.email.as_str()),
        attachment: submission.attachment.as_ref(),
    };
    email_service
        .send(&outgoing)
        .await
        .with_context(|| format!("Sending lead e-mail for submission {}", submission_id))?;
    Ok(())
}

async fn notify_sales_team(
    state: &AppState,
    submission: &ValidatedSubmission,
    decision: &eligibility::EligibilityDecision,
) -> Result<(), AppError> {
    let service = WhatsAppService::new(&state.config, state.http.clone())?;
    service
        .notify(&notifications::whatsapp_text(submission, decision))
        .await
}

async fn sync_with_crm(
    state: &AppState,
    submission: &ValidatedSubmission,
    decision: &eligibility::EligibilityDecision,
) -> Result<(), AppError> {
    let Some(kommo) = &state.kommo else {
        tracing::debug!("Kommo not configured; skipping CRM sync");
        return Ok(());
    };

    let result = kommo
        .sync_lead(&submission.lead_summary(decision))
        .await
        .context("Kommo sync")?;
    tracing::info!(
        "✅ Lead synced to Kommo: lead_id={}, contact_id={}, reused_contact={}",
        result.lead_id,
        result.contact_id,
        result.contact_reused
    );
    Ok(())
}
