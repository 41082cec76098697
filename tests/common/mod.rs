#![allow(dead_code)]

use solar_leads_api::config::{Config, KommoFieldMap};

/// Config with every integration pointed at `base_url` and configured.
pub fn test_config(base_url: &str) -> Config {
    Config {
        port: 3000,
        cep_lookup_base_url: base_url.to_string(),
        email_api_base_url: base_url.to_string(),
        email_api_key: Some("re_test_key".to_string()),
        email_from: Some("Leads <leads@example.com>".to_string()),
        lead_email_to: vec!["vendas@example.com".to_string()],
        kommo_base_url: Some(base_url.to_string()),
        kommo_token: Some("kommo_test_token".to_string()),
        kommo_pipeline_id: Some(7001),
        kommo_status_id: Some(42),
        kommo_fields: KommoFieldMap {
            municipality: Some(501),
            consumption: Some(503),
            utm_source: Some(505),
            ..Default::default()
        },
        whatsapp_api_base_url: base_url.to_string(),
        whatsapp_token: Some("wa_test_token".to_string()),
        whatsapp_phone_number_id: Some("1234567890".to_string()),
        whatsapp_notify_to: Some("+55 11 99999-0000".to_string()),
        crm_rate_limit_max: 10,
        crm_rate_limit_window_secs: 600,
        accept_legacy_phone_length: false,
    }
}

/// Same as [`test_config`] with e-mail, Kommo and WhatsApp left unset.
pub fn bare_config(base_url: &str) -> Config {
    Config {
        email_api_key: None,
        email_from: None,
        lead_email_to: Vec::new(),
        kommo_base_url: None,
        kommo_token: None,
        whatsapp_token: None,
        whatsapp_phone_number_id: None,
        whatsapp_notify_to: None,
        ..test_config(base_url)
    }
}

pub fn viacep_body(cep: &str, city: &str, uf: &str) -> serde_json::Value {
    serde_json::json!({
        "cep": cep,
        "logradouro": "Rua Teste",
        "bairro": "Centro",
        "localidade": city,
        "uf": uf
    })
}
