use crate::circuit_breaker::{create_crm_circuit_breaker, CrmCircuitBreaker};
use crate::config::{Config, KommoFieldMap};
use crate::crm_models::{
    KommoCustomFieldValue, KommoEntityRef, KommoLeadEmbedded, KommoListResponse, KommoNewContact,
    KommoNewLead, LeadSummary,
};
use crate::errors::AppError;
use failsafe::futures::CircuitBreaker as _;
use reqwest::{RequestBuilder, StatusCode};
use std::future::Future;
use std::time::Duration;

/// Outcome of pushing a lead into Kommo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KommoSyncResult {
    pub contact_id: i64,
    pub lead_id: i64,
    /// An existing contact matched by phone or e-mail was reused.
    pub contact_reused: bool,
}

/// Client for the Kommo CRM REST API (v4).
#[derive(Clone)]
pub struct KommoClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    pipeline_id: Option<i64>,
    status_id: Option<i64>,
    fields: KommoFieldMap,
    breaker: CrmCircuitBreaker,
}

impl KommoClient {
    /// Creates a new `KommoClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Account URL, e.g. `https://empresa.kommo.com`.
    /// * `token` - Long-lived integration token.
    /// * `fields` - Custom-field IDs the lead attributes map onto.
    pub fn new(base_url: String, token: String, fields: KommoFieldMap) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Kommo client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            pipeline_id: None,
            status_id: None,
            fields,
            breaker: create_crm_circuit_breaker(),
        })
    }

    /// Builds the client from configuration; `Ok(None)` when Kommo is not
    /// configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        let (Some(base_url), Some(token)) = (&config.kommo_base_url, &config.kommo_token) else {
            return Ok(None);
        };

        let client = Self::new(base_url.clone(), token.clone(), config.kommo_fields.clone())?
            .with_pipeline(config.kommo_pipeline_id, config.kommo_status_id);
        Ok(Some(client))
    }

    /// Places new leads in a specific pipeline stage.
    pub fn with_pipeline(mut self, pipeline_id: Option<i64>, status_id: Option<i64>) -> Self {
        self.pipeline_id = pipeline_id;
        self.status_id = status_id;
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    /// Runs a call through the circuit breaker. No retries.
    async fn guarded<T, F>(&self, operation: &str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match self.breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Kommo circuit open, rejecting {}", operation);
                Err(AppError::ExternalApiError(format!(
                    "Kommo temporarily unavailable ({})",
                    operation
                )))
            }
        }
    }

    async fn error_from(response: reqwest::Response, operation: &str) -> AppError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        AppError::ExternalApiError(format!(
            "Kommo {} failed {}: {}",
            operation, status, error_text
        ))
    }

    /// Searches contacts by free-text query (phone digits or e-mail).
    ///
    /// # Returns
    ///
    /// * `Result<Option<i64>, AppError>` - ID of the first match, if any.
    pub async fn find_contact(&self, query: &str) -> Result<Option<i64>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/api/v4/contacts", self.base_url);
        tracing::debug!("Searching Kommo contacts");

        self.guarded("contact search", async {
            let response = self
                .authorized(self.client.get(&url))
                .query(&[("query", query), ("limit", "1")])
                .send()
                .await
                .map_err(|e| {
                    AppError::ExternalApiError(format!("Kommo request failed: {}", e))
                })?;

            // Kommo answers 204 No Content when nothing matches.
            if response.status() == StatusCode::NO_CONTENT {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(Self::error_from(response, "contact search").await);
            }

            let body: KommoListResponse = response.json().await.map_err(|e| {
                AppError::ExternalApiError(format!("Failed to parse Kommo contacts: {}", e))
            })?;
            Ok(body.embedded.contacts.first().map(|c| c.id))
        })
        .await
    }

    /// Creates a contact carrying the lead's phone and e-mail.
    pub async fn create_contact(&self, lead: &LeadSummary) -> Result<i64, AppError> {
        let url = format!("{}/api/v4/contacts", self.base_url);
        tracing::info!("Creating Kommo contact: {}", lead.name);

        let mut custom_fields_values = Vec::new();
        if !lead.whatsapp.is_empty() {
            custom_fields_values.push(KommoCustomFieldValue::by_code(
                "PHONE",
                &lead.whatsapp,
                "WORK",
            ));
        }
        if !lead.email.is_empty() {
            custom_fields_values.push(KommoCustomFieldValue::by_code(
                "EMAIL",
                &lead.email,
                "WORK",
            ));
        }
        let body = vec![KommoNewContact {
            name: lead.name.clone(),
            custom_fields_values,
        }];

        self.guarded("contact creation", async {
            let response = self
                .authorized(self.client.post(&url))
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    AppError::ExternalApiError(format!("Failed to create contact: {}", e))
                })?;

            if !response.status().is_success() {
                return Err(Self::error_from(response, "contact creation").await);
            }

            let created: KommoListResponse = response.json().await.map_err(|e| {
                AppError::ExternalApiError(format!("Failed to parse contact response: {}", e))
            })?;
            created
                .embedded
                .contacts
                .first()
                .map(|c| c.id)
                .ok_or_else(|| {
                    AppError::ExternalApiError(
                        "Contact creation response missing 'id' field".to_string(),
                    )
                })
        })
        .await
    }

    /// Creates a lead linked to `contact_id`, with mapped custom fields and tags.
    pub async fn create_lead(&self, lead: &LeadSummary, contact_id: i64) -> Result<i64, AppError> {
        let url = format!("{}/api/v4/leads", self.base_url);
        tracing::info!("Creating Kommo lead for contact {}", contact_id);

        let body = vec![KommoNewLead {
            name: lead.lead_title(),
            pipeline_id: self.pipeline_id,
            status_id: self.status_id,
            custom_fields_values: lead.custom_fields(&self.fields),
            embedded: KommoLeadEmbedded {
                contacts: vec![KommoEntityRef { id: contact_id }],
                tags: lead.tags(),
            },
        }];

        let lead_id = self
            .guarded("lead creation", async {
                let response = self
                    .authorized(self.client.post(&url))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        AppError::ExternalApiError(format!("Failed to create lead: {}", e))
                    })?;

                if !response.status().is_success() {
                    return Err(Self::error_from(response, "lead creation").await);
                }

                let created: KommoListResponse = response.json().await.map_err(|e| {
                    AppError::ExternalApiError(format!("Failed to parse lead response: {}", e))
                })?;
                created
                    .embedded
                    .leads
                    .first()
                    .map(|l| l.id)
                    .ok_or_else(|| {
                        AppError::ExternalApiError(
                            "Lead creation response missing 'id' field".to_string(),
                        )
                    })
            })
            .await?;

        tracing::info!("✓ Kommo lead created: {}", lead_id);
        Ok(lead_id)
    }

    /// Deduplicates the contact (phone first, then e-mail), creates it if
    /// needed, then creates the lead.
    pub async fn sync_lead(&self, lead: &LeadSummary) -> Result<KommoSyncResult, AppError> {
        let mut existing = self.find_contact(&lead.phone_query()).await?;
        if existing.is_none() {
            existing = self.find_contact(&lead.email).await?;
        }

        let (contact_id, contact_reused) = match existing {
            Some(id) => {
                tracing::info!("Reusing existing Kommo contact {}", id);
                (id, true)
            }
            None => (self.create_contact(lead).await?, false),
        };

        let lead_id = self.create_lead(lead, contact_id).await?;

        Ok(KommoSyncResult {
            contact_id,
            lead_id,
            contact_reused,
        })
    }
}
