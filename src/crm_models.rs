use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::KommoFieldMap;
use crate::eligibility::{EligibilityStatus, Priority};
use crate::errors::ErrorCode;
use crate::models::{Attribution, NumericInput};

/// Tag added to every lead created from the website.
pub const SITE_TAG: &str = "site-leasing-solar";

// ============ CRM endpoint envelope ============

/// Reduced lead payload accepted by the CRM-only endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmLeadRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub whatsapp: String,
    pub municipality: Option<String>,
    pub property_type: Option<String>,
    pub consumption: Option<NumericInput>,
    pub system_type: Option<String>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

/// `{ok: true, leadId}` or `{ok: false, errorCode, message}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrmResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CrmResponse {
    pub fn success(lead_id: i64) -> Self {
        Self {
            ok: true,
            lead_id: Some(lead_id),
            error_code: None,
            message: None,
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            lead_id: None,
            error_code: Some(code),
            message: Some(message.into()),
        }
    }
}

// ============ Normalized lead ============

/// Everything the CRM needs about a lead, whichever form produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadSummary {
    pub name: String,
    pub email: String,
    /// E.164 when recognized, else raw digits.
    pub whatsapp: String,
    pub municipality: Option<String>,
    pub property_type: Option<String>,
    pub consumption_kwh: Option<u32>,
    pub system_type: Option<String>,
    pub attribution: Attribution,
    pub status: Option<EligibilityStatus>,
    pub priority: Option<Priority>,
}

impl LeadSummary {
    pub fn lead_title(&self) -> String {
        format!("{} - Leasing Solar", self.name)
    }

    /// Digits used to search for an existing contact.
    pub fn phone_query(&self) -> String {
        crate::validation::only_digits(&self.whatsapp)
    }

    /// Maps the lead onto the account's custom fields. Unmapped or empty
    /// fields are left out.
    pub fn custom_fields(&self, fields: &KommoFieldMap) -> Vec<KommoCustomFieldValue> {
        let a = &self.attribution;
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| json!(s))
        };

        let candidates: [(Option<i64>, Option<Value>); 11] = [
            (fields.municipality, text(&self.municipality)),
            (fields.property_type, text(&self.property_type)),
            (fields.consumption, self.consumption_kwh.map(|kwh| json!(kwh))),
            (fields.system_type, text(&self.system_type)),
            (fields.utm_source, text(&a.utm_source)),
            (fields.utm_medium, text(&a.utm_medium)),
            (fields.utm_campaign, text(&a.utm_campaign)),
            (fields.utm_term, text(&a.utm_term)),
            (fields.utm_content, text(&a.utm_content)),
            (fields.gclid, text(&a.gclid)),
            (fields.fbclid, text(&a.fbclid)),
        ];

        candidates
            .into_iter()
            .filter_map(|(id, value)| Some(KommoCustomFieldValue::by_id(id?, value?)))
            .collect()
    }

    pub fn tags(&self) -> Vec<KommoTag> {
        let mut tags = vec![SITE_TAG.to_string()];
        if let Some(status) = self.status {
            tags.push(status.label().to_string());
        }
        if let Some(priority) = self.priority {
            tags.push(format!("prioridade-{}", priority.label().to_lowercase()));
        }
        for value in [&self.attribution.utm_source, &self.attribution.utm_campaign]
            .into_iter()
            .flatten()
        {
            let value = value.trim();
            if !value.is_empty() && !tags.iter().any(|t| t == value) {
                tags.push(value.to_string());
            }
        }
        tags.into_iter().map(|name| KommoTag { name }).collect()
    }
}

// ============ Kommo API v4 payloads ============

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KommoFieldValue {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KommoCustomFieldValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_code: Option<String>,
    pub values: Vec<KommoFieldValue>,
}

impl KommoCustomFieldValue {
    pub fn by_id(field_id: i64, value: Value) -> Self {
        Self {
            field_id: Some(field_id),
            field_code: None,
            values: vec![KommoFieldValue {
                value,
                enum_code: None,
            }],
        }
    }

    /// Built-in contact fields (PHONE, EMAIL) use codes instead of IDs.
    pub fn by_code(code: &str, value: &str, enum_code: &str) -> Self {
        Self {
            field_id: None,
            field_code: Some(code.to_string()),
            values: vec![KommoFieldValue {
                value: json!(value),
                enum_code: Some(enum_code.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KommoTag {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KommoEntityRef {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KommoNewContact {
    pub name: String,
    pub custom_fields_values: Vec<KommoCustomFieldValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KommoLeadEmbedded {
    pub contacts: Vec<KommoEntityRef>,
    pub tags: Vec<KommoTag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KommoNewLead {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields_values: Vec<KommoCustomFieldValue>,
    #[serde(rename = "_embedded")]
    pub embedded: KommoLeadEmbedded,
}

/// `{"_embedded": {"contacts": [...]}}` / `{"_embedded": {"leads": [...]}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KommoEmbeddedList {
    #[serde(default)]
    pub contacts: Vec<KommoEntityRef>,
    #[serde(default)]
    pub leads: Vec<KommoEntityRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KommoListResponse {
    #[serde(rename = "_embedded", default)]
    pub embedded: KommoEmbeddedList,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> LeadSummary {
        LeadSummary {
            name: "João Lima".to_string(),
            email: "joao@example.com".to_string(),
            whatsapp: "+5511987654321".to_string(),
            municipality: Some("Campinas/SP".to_string()),
            property_type: Some("Residencial".to_string()),
            consumption_kwh: Some(640),
            system_type: Some("  ".to_string()),
            attribution: Attribution {
                utm_source: Some("google".to_string()),
                utm_campaign: Some("leasing-sp".to_string()),
                ..Default::default()
            },
            status: Some(EligibilityStatus::PreApproved),
            priority: Some(Priority::Medium),
        }
    }

    #[test]
    fn test_custom_fields_only_mapped_and_filled() {
        let fields = KommoFieldMap {
            municipality: Some(101),
            consumption: Some(103),
            system_type: Some(104),
            utm_source: Some(105),
            gclid: Some(110),
            ..Default::default()
        };
        let values = summary().custom_fields(&fields);
        let ids: Vec<i64> = values.iter().filter_map(|v| v.field_id).collect();
        // system_type is blank and gclid absent; property_type unmapped.
        assert_eq!(ids, vec![101, 103, 105]);
        assert_eq!(values[1].values[0].value, json!(640));
    }

    #[test]
    fn test_no_custom_fields_without_map() {
        assert!(summary().custom_fields(&KommoFieldMap::default()).is_empty());
    }

    #[test]
    fn test_tags() {
        let names: Vec<String> = summary().tags().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                SITE_TAG.to_string(),
                "PRE_APPROVED".to_string(),
                "prioridade-média".to_string(),
                "google".to_string(),
                "leasing-sp".to_string(),
            ]
        );
    }

    #[test]
    fn test_phone_query_strips_plus() {
        assert_eq!(summary().phone_query(), "5511987654321");
    }

    #[test]
    fn test_crm_response_shapes() {
        let ok = serde_json::to_value(CrmResponse::success(42)).unwrap();
        assert_eq!(ok, json!({"ok": true, "leadId": 42}));

        let err = serde_json::to_value(CrmResponse::failure(ErrorCode::RateLimited, "slow down"))
            .unwrap();
        assert_eq!(
            err,
            json!({"ok": false, "errorCode": "RATE_LIMITED", "message": "slow down"})
        );
    }

    #[test]
    fn test_new_lead_serializes_embedded_key() {
        let lead = KommoNewLead {
            name: summary().lead_title(),
            pipeline_id: None,
            status_id: Some(42),
            custom_fields_values: Vec::new(),
            embedded: KommoLeadEmbedded {
                contacts: vec![KommoEntityRef { id: 7 }],
                tags: Vec::new(),
            },
        };
        let value = serde_json::to_value(&lead).unwrap();
        assert_eq!(value["_embedded"]["contacts"], json!([{"id": 7}]));
        assert!(value.get("embedded").is_none());
        assert!(value.get("pipeline_id").is_none());
        assert!(value.get("custom_fields_values").is_none());
    }

    #[test]
    fn test_parse_list_response() {
        let body = r#"{"_page": 1, "_embedded": {"contacts": [{"id": 7, "name": "x"}]}}"#;
        let parsed: KommoListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embedded.contacts, vec![KommoEntityRef { id: 7 }]);
        assert!(parsed.embedded.leads.is_empty());
    }
}
