use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::{
    crm_models::{CrmLeadRequest, CrmResponse, LeadSummary},
    errors::{AppError, ErrorCode, ResultExt},
    handlers::AppState,
    validation::{is_valid_email, is_valid_phone, normalize_br_phone, only_digits, parse_consumption},
};

/// Source identifier used for rate limiting: first `X-Forwarded-For` hop,
/// then `X-Real-IP`, else "unknown".
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}

fn reply(code: ErrorCode, message: impl Into<String>) -> (StatusCode, Json<CrmResponse>) {
    (code.status(), Json(CrmResponse::failure(code, message)))
}

/// Checks the reduced payload and builds the CRM lead.
fn validate_crm_lead(
    request: CrmLeadRequest,
    allow_legacy_phone: bool,
) -> Result<LeadSummary, AppError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Nome é obrigatório.".to_string()));
    }

    let email = request.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("E-mail inválido.".to_string()));
    }

    if !is_valid_phone(&request.whatsapp, allow_legacy_phone) {
        return Err(AppError::BadRequest("WhatsApp inválido.".to_string()));
    }
    let whatsapp =
        normalize_br_phone(&request.whatsapp).unwrap_or_else(|| only_digits(&request.whatsapp));

    let consumption_kwh = match &request.consumption {
        Some(raw) if !raw.as_text().trim().is_empty() => Some(
            parse_consumption(&raw.as_text())
                .ok_or_else(|| AppError::BadRequest("Consumo inválido.".to_string()))?,
        ),
        _ => None,
    };

    Ok(LeadSummary {
        name,
        email,
        whatsapp,
        municipality: request.municipality,
        property_type: request.property_type,
        consumption_kwh,
        system_type: request.system_type,
        attribution: request.attribution,
        status: None,
        priority: None,
    })
}

/// POST /api/v1/crm/leads
///
/// CRM-only submission. Unlike the e-mail flow, a CRM failure is reported to
/// the caller.
///
/// Flow:
/// 1. Rate limit by source (10 per 10 minutes by default).
/// 2. Parse JSON (`INVALID_JSON` on failure).
/// 3. Validate (`VALIDATION_ERROR`).
/// 4. Require Kommo configuration (`SERVER_NOT_CONFIGURED`).
/// 5. Deduplicate contact and create the lead (`KOMMO_ERROR`).
pub async fn submit_crm_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<CrmResponse>) {
    let source = client_key(&headers);
    if !state.crm_rate_limiter.check(&source) {
        tracing::warn!("CRM submission rate limited for {}", source);
        return reply(
            ErrorCode::RateLimited,
            "Muitas tentativas. Aguarde alguns minutos e tente novamente.",
        );
    }

    let request: CrmLeadRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Invalid CRM lead JSON: {}", e);
            return reply(ErrorCode::InvalidJson, "JSON inválido.");
        }
    };

    let lead = match validate_crm_lead(request, state.config.accept_legacy_phone_length) {
        Ok(lead) => lead,
        Err(e) => {
            let message = match &e {
                AppError::BadRequest(msg) => msg.clone(),
                other => other.to_string(),
            };
            return reply(ErrorCode::from(&e), message);
        }
    };

    let Some(kommo) = &state.kommo else {
        tracing::error!("CRM submission received but Kommo is not configured");
        return reply(
            ErrorCode::ServerNotConfigured,
            "Integração com o CRM não configurada.",
        );
    };

    match kommo.sync_lead(&lead).await.context("Kommo sync") {
        Ok(result) => {
            tracing::info!(
                "✅ CRM lead created: lead_id={}, contact_id={}, reused_contact={}",
                result.lead_id,
                result.contact_id,
                result.contact_reused
            );
            (StatusCode::OK, Json(CrmResponse::success(result.lead_id)))
        }
        Err(e) => {
            tracing::error!("CRM submission failed: {}", e);
            let code = match ErrorCode::from(&e) {
                ErrorCode::KommoError => ErrorCode::KommoError,
                _ => ErrorCode::UnknownError,
            };
            reply(
                code,
                "Não foi possível registrar seu contato agora. Tente novamente.",
            )
        }
    }
}
