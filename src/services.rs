use crate::attachment::ValidatedAttachment;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::CepLookupResponse;
use crate::validation::only_digits;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Shared HTTP client for all outbound integrations.
pub fn build_http_client() -> Result<Client, AppError> {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))
}

/// Cache of resolved postal codes. Key: 8 CEP digits.
pub type CepCache = Cache<String, CepLookupResponse>;

pub fn build_cep_cache() -> CepCache {
    Cache::builder()
        .time_to_live(Duration::from_secs(86_400))
        .max_capacity(20_000)
        .build()
}

// ============ Address Lookup ============

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    cep: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    /// ViaCEP answers `{"erro": true}` (or `"true"`) for unknown codes.
    erro: Option<Value>,
}

impl ViaCepResponse {
    fn is_not_found(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(_) => true,
            None => false,
        }
    }
}

pub struct CepLookupService {
    client: Client,
    base_url: String,
    cache: CepCache,
}

impl CepLookupService {
    pub fn new(config: &Config, client: Client, cache: CepCache) -> Self {
        Self {
            client,
            base_url: config.cep_lookup_base_url.clone(),
            cache,
        }
    }

    /// Resolves a CEP to its municipality.
    ///
    /// `Ok(None)` means the lookup succeeded and the code does not exist.
    pub async fn lookup(&self, cep: &str) -> Result<Option<CepLookupResponse>, AppError> {
        let digits = only_digits(cep);
        if digits.len() != 8 {
            return Ok(None);
        }

        if let Some(cached) = self.cache.get(&digits).await {
            tracing::debug!("CEP cache HIT: {}", digits);
            return Ok(Some(cached));
        }

        let url = format!("{}/ws/{}/json/", self.base_url, digits);
        tracing::info!("CEP cache MISS - looking up {}", digits);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("CEP lookup failed: {}", e)))?;

        // ViaCEP answers 400 for malformed codes.
        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::NOT_FOUND
        {
            tracing::warn!("CEP lookup rejected {}: {}", digits, response.status());
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "CEP lookup returned status {}",
                status
            )));
        }

        let body: ViaCepResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse CEP lookup response: {}", e))
        })?;

        if body.is_not_found() {
            tracing::info!("CEP not found: {}", digits);
            return Ok(None);
        }

        let (Some(city), Some(state)) = (body.localidade, body.uf) else {
            tracing::warn!("CEP lookup for {} returned no city/state", digits);
            return Ok(None);
        };
        if city.trim().is_empty() || state.trim().is_empty() {
            return Ok(None);
        }

        let resolved = CepLookupResponse {
            cep: body
                .cep
                .unwrap_or_else(|| format!("{}-{}", &digits[..5], &digits[5..])),
            municipality: format!("{}/{}", city.trim(), state.trim()),
            city,
            state,
        };

        self.cache.insert(digits, resolved.clone()).await;
        Ok(Some(resolved))
    }
}

// ============ Transactional E-mail ============

#[derive(Debug, Serialize)]
struct EmailAttachmentPayload<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct SendEmailPayload<'a> {
    from: &'a str,
    to: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<EmailAttachmentPayload<'a>>,
}

/// A message ready to be handed to the e-mail provider.
#[derive(Debug, Clone)]
pub struct OutgoingEmail<'a> {
    pub subject: String,
    pub html: String,
    pub reply_to: Option<&'a str>,
    pub attachment: Option<&'a ValidatedAttachment>,
}

pub struct EmailService {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
    to: Vec<String>,
}

impl EmailService {
    pub fn new(config: &Config, client: Client) -> Result<Self, AppError> {
        let (Some(api_key), Some(from)) = (&config.email_api_key, &config.email_from) else {
            return Err(AppError::NotConfigured(
                "EMAIL_API_KEY and EMAIL_FROM are required".to_string(),
            ));
        };
        if config.lead_email_to.is_empty() {
            return Err(AppError::NotConfigured("LEAD_EMAIL_TO is required".to_string()));
        }

        Ok(Self {
            client,
            base_url: config.email_api_base_url.clone(),
            api_key: api_key.clone(),
            from: from.clone(),
            to: config.lead_email_to.clone(),
        })
    }

    /// Sends the e-mail and returns the provider's message id.
    pub async fn send(&self, email: &OutgoingEmail<'_>) -> Result<String, AppError> {
        let url = format!("{}/emails", self.base_url);
        let attachments = email
            .attachment
            .map(|a| {
                vec![EmailAttachmentPayload {
                    filename: &a.file_name,
                    content: a.to_base64(),
                }]
            })
            .unwrap_or_default();

        let payload = SendEmailPayload {
            from: &self.from,
            to: &self.to,
            reply_to: email.reply_to,
            subject: &email.subject,
            html: &email.html,
            attachments,
        };

        tracing::info!("Sending lead e-mail to {} recipient(s)", self.to.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("E-mail request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "E-mail provider returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse e-mail response: {}", e))
        })?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        tracing::info!("✓ Lead e-mail accepted by provider: {}", id);
        Ok(id)
    }
}

// ============ WhatsApp Notification ============

pub struct WhatsAppService {
    client: Client,
    base_url: String,
    token: String,
    phone_number_id: String,
    notify_to: String,
}

impl WhatsAppService {
    pub fn new(config: &Config, client: Client) -> Result<Self, AppError> {
        match (
            &config.whatsapp_token,
            &config.whatsapp_phone_number_id,
            &config.whatsapp_notify_to,
        ) {
            (Some(token), Some(phone_number_id), Some(notify_to)) => Ok(Self {
                client,
                base_url: config.whatsapp_api_base_url.clone(),
                token: token.clone(),
                phone_number_id: phone_number_id.clone(),
                notify_to: only_digits(notify_to),
            }),
            _ => Err(AppError::NotConfigured(
                "WHATSAPP_TOKEN, WHATSAPP_PHONE_NUMBER_ID and WHATSAPP_NOTIFY_TO are required"
                    .to_string(),
            )),
        }
    }

    /// Sends a plain-text alert to the sales team number.
    pub async fn notify(&self, text: &str) -> Result<(), AppError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let body = json!({
            "messaging_product": "whatsapp",
            "to": self.notify_to,
            "type": "text",
            "text": { "body": text }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("WhatsApp request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "WhatsApp API returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!("✓ WhatsApp notification sent");
        Ok(())
    }
}
