use serde::Deserialize;

/// Kommo custom-field IDs the lead form maps onto.
///
/// Each ID is account-specific; unmapped fields are simply not sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KommoFieldMap {
    pub municipality: Option<i64>,
    pub property_type: Option<i64>,
    pub consumption: Option<i64>,
    pub system_type: Option<i64>,
    pub utm_source: Option<i64>,
    pub utm_medium: Option<i64>,
    pub utm_campaign: Option<i64>,
    pub utm_term: Option<i64>,
    pub utm_content: Option<i64>,
    pub gclid: Option<i64>,
    pub fbclid: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub cep_lookup_base_url: String,
    pub email_api_base_url: String,
    pub email_api_key: Option<String>,
    pub email_from: Option<String>,
    pub lead_email_to: Vec<String>,
    pub kommo_base_url: Option<String>,
    pub kommo_token: Option<String>,
    pub kommo_pipeline_id: Option<i64>,
    pub kommo_status_id: Option<i64>,
    pub kommo_fields: KommoFieldMap,
    pub whatsapp_api_base_url: String,
    pub whatsapp_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_notify_to: Option<String>,
    pub crm_rate_limit_max: usize,
    pub crm_rate_limit_window_secs: u64,
    /// Accept 10-digit phone numbers (landline without the mobile 9th digit).
    pub accept_legacy_phone_length: bool,
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn http_url(key: &str, default: &str) -> anyhow::Result<String> {
    let url = optional_var(key).unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", key);
    }
    url::Url::parse(&url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", key, e))?;
    Ok(url.trim_end_matches('/').to_string())
}

fn optional_http_url(key: &str) -> anyhow::Result<Option<String>> {
    match optional_var(key) {
        Some(_) => http_url(key, "").map(Some),
        None => Ok(None),
    }
}

fn optional_id(key: &str) -> anyhow::Result<Option<i64>> {
    optional_var(key)
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("{} must be a numeric ID", key))
        })
        .transpose()
}

/// Parses a strictly positive integer setting.
fn parse_positive<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a positive number", key))?;
    if value == T::default() {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

impl KommoFieldMap {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            municipality: optional_id("KOMMO_FIELD_MUNICIPALITY")?,
            property_type: optional_id("KOMMO_FIELD_PROPERTY_TYPE")?,
            consumption: optional_id("KOMMO_FIELD_CONSUMPTION")?,
            system_type: optional_id("KOMMO_FIELD_SYSTEM_TYPE")?,
            utm_source: optional_id("KOMMO_FIELD_UTM_SOURCE")?,
            utm_medium: optional_id("KOMMO_FIELD_UTM_MEDIUM")?,
            utm_campaign: optional_id("KOMMO_FIELD_UTM_CAMPAIGN")?,
            utm_term: optional_id("KOMMO_FIELD_UTM_TERM")?,
            utm_content: optional_id("KOMMO_FIELD_UTM_CONTENT")?,
            gclid: optional_id("KOMMO_FIELD_GCLID")?,
            fbclid: optional_id("KOMMO_FIELD_FBCLID")?,
        })
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            cep_lookup_base_url: http_url("CEP_LOOKUP_BASE_URL", "https://viacep.com.br")?,
            email_api_base_url: http_url("EMAIL_API_BASE_URL", "https://api.resend.com")?,
            email_api_key: optional_var("EMAIL_API_KEY"),
            email_from: optional_var("EMAIL_FROM"),
            lead_email_to: optional_var("LEAD_EMAIL_TO")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            kommo_base_url: optional_http_url("KOMMO_BASE_URL")?,
            kommo_token: optional_var("KOMMO_TOKEN"),
            kommo_pipeline_id: optional_id("KOMMO_PIPELINE_ID")?,
            kommo_status_id: optional_id("KOMMO_STATUS_ID")?,
            kommo_fields: KommoFieldMap::from_env()?,
            whatsapp_api_base_url: http_url(
                "WHATSAPP_API_BASE_URL",
                "https://graph.facebook.com/v19.0",
            )?,
            whatsapp_token: optional_var("WHATSAPP_TOKEN"),
            whatsapp_phone_number_id: optional_var("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_notify_to: optional_var("WHATSAPP_NOTIFY_TO"),
            crm_rate_limit_max: parse_positive(
                "CRM_RATE_LIMIT_MAX",
                &optional_var("CRM_RATE_LIMIT_MAX").unwrap_or_else(|| "10".to_string()),
            )?,
            crm_rate_limit_window_secs: parse_positive(
                "CRM_RATE_LIMIT_WINDOW_SECS",
                &optional_var("CRM_RATE_LIMIT_WINDOW_SECS").unwrap_or_else(|| "600".to_string()),
            )?,
            accept_legacy_phone_length: optional_var("ACCEPT_LEGACY_PHONE_LENGTH")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("CEP lookup URL: {}", config.cep_lookup_base_url);
        tracing::debug!("E-mail API URL: {}", config.email_api_base_url);
        if !config.email_configured() {
            tracing::warn!("E-mail delivery not configured; pre-qualification submissions will fail");
        }
        match config.kommo_base_url {
            Some(ref url) if config.kommo_token.is_some() => {
                tracing::info!("Kommo CRM configured: {}", url)
            }
            _ => tracing::warn!("Kommo CRM not configured; CRM sync disabled"),
        }
        if !config.whatsapp_configured() {
            tracing::warn!("WhatsApp notifications not configured");
        }
        tracing::debug!(
            "CRM rate limit: {} per {}s",
            config.crm_rate_limit_max,
            config.crm_rate_limit_window_secs
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn email_configured(&self) -> bool {
        self.email_api_key.is_some() && self.email_from.is_some() && !self.lead_email_to.is_empty()
    }

    pub fn whatsapp_configured(&self) -> bool {
        self.whatsapp_token.is_some()
            && self.whatsapp_phone_number_id.is_some()
            && self.whatsapp_notify_to.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_rejects_zero_window() {
        assert!(parse_positive::<u64>("CRM_RATE_LIMIT_WINDOW_SECS", "0").is_err());
        assert!(parse_positive::<usize>("CRM_RATE_LIMIT_MAX", "0").is_err());
    }

    #[test]
    fn test_parse_positive_values() {
        assert_eq!(parse_positive::<u64>("CRM_RATE_LIMIT_WINDOW_SECS", " 600 ").unwrap(), 600);
        assert_eq!(parse_positive::<usize>("CRM_RATE_LIMIT_MAX", "10").unwrap(), 10);
        assert!(parse_positive::<u64>("CRM_RATE_LIMIT_WINDOW_SECS", "-1").is_err());
        assert!(parse_positive::<u64>("CRM_RATE_LIMIT_WINDOW_SECS", "ten").is_err());
    }
}
