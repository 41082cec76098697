use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eligibility::{EligibilityDecision, EligibilityStatus, Priority};

// ============ Form Enumerations ============

/// Customer category selected on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomerCategory {
    #[serde(rename = "residencial")]
    Residential,
    #[serde(rename = "comercial")]
    Commercial,
    #[serde(rename = "condominio_vertical")]
    VerticalCondominium,
    #[serde(rename = "condominio_horizontal")]
    HorizontalCondominium,
    #[serde(rename = "outro")]
    Other,
}

impl CustomerCategory {
    pub fn label(self) -> &'static str {
        match self {
            CustomerCategory::Residential => "Residencial",
            CustomerCategory::Commercial => "Comercial",
            CustomerCategory::VerticalCondominium => "Condomínio vertical",
            CustomerCategory::HorizontalCondominium => "Condomínio horizontal",
            CustomerCategory::Other => "Outro",
        }
    }
}

/// Applicant's relationship with the property where the system goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyRelationship {
    #[serde(rename = "proprietario")]
    Owner,
    #[serde(rename = "inquilino")]
    Tenant,
    #[serde(rename = "comodatario")]
    GratuitousHolder,
    #[serde(rename = "arrendatario")]
    Lessee,
    #[serde(rename = "parente_proprietario")]
    OwnerRelative,
    #[serde(rename = "administrador")]
    Administrator,
}

impl PropertyRelationship {
    pub const ALL: [PropertyRelationship; 6] = [
        PropertyRelationship::Owner,
        PropertyRelationship::Tenant,
        PropertyRelationship::GratuitousHolder,
        PropertyRelationship::Lessee,
        PropertyRelationship::OwnerRelative,
        PropertyRelationship::Administrator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PropertyRelationship::Owner => "Proprietário",
            PropertyRelationship::Tenant => "Inquilino",
            PropertyRelationship::GratuitousHolder => "Comodatário",
            PropertyRelationship::Lessee => "Arrendatário",
            PropertyRelationship::OwnerRelative => "Parente do proprietário",
            PropertyRelationship::Administrator => "Administrador/Síndico",
        }
    }
}

/// Where the panels are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallationType {
    #[serde(rename = "telhado_ceramico", alias = "Telhado cerâmico")]
    CeramicRoof,
    #[serde(rename = "telhado_fibrocimento", alias = "Telhado fibrocimento")]
    FiberCementRoof,
    #[serde(rename = "telhado_metalico", alias = "Telhado metálico")]
    MetalRoof,
    #[serde(rename = "laje", alias = "Laje")]
    Slab,
    #[serde(rename = "solo", alias = "Solo")]
    Ground,
    #[serde(rename = "solo_laje", alias = "Solo/Laje")]
    GroundSlab,
    #[serde(rename = "outro", alias = "Outro")]
    Other,
}

impl InstallationType {
    pub fn label(self) -> &'static str {
        match self {
            InstallationType::CeramicRoof => "Telhado cerâmico",
            InstallationType::FiberCementRoof => "Telhado fibrocimento",
            InstallationType::MetalRoof => "Telhado metálico",
            InstallationType::Slab => "Laje",
            InstallationType::Ground => "Solo",
            InstallationType::GroundSlab => "Solo/Laje",
            InstallationType::Other => "Outro",
        }
    }
}

// ============ Request Models ============

/// Numeric form fields arrive either as JSON numbers or as typed text
/// ("350,5").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    pub fn as_text(&self) -> String {
        match self {
            NumericInput::Number(n) => n.to_string(),
            NumericInput::Text(s) => s.clone(),
        }
    }
}

impl Default for NumericInput {
    fn default() -> Self {
        NumericInput::Text(String::new())
    }
}

/// Campaign attribution captured by the landing page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub gclid: Option<String>,
    pub fbclid: Option<String>,
}

impl Attribution {
    /// Non-empty attribution values as (label, value) pairs.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("utm_source", &self.utm_source),
            ("utm_medium", &self.utm_medium),
            ("utm_campaign", &self.utm_campaign),
            ("utm_term", &self.utm_term),
            ("utm_content", &self.utm_content),
            ("gclid", &self.gclid),
            ("fbclid", &self.fbclid),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (label, v))
        })
        .collect()
    }
}

/// Energy bill uploaded with the form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub content_base64: String,
}

/// Pre-qualification form submission.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreQualificationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub whatsapp: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cep: String,
    /// Client-side hint only; the server resolves the municipality itself.
    pub municipality: Option<String>,
    pub customer_category: CustomerCategory,
    pub customer_category_other: Option<String>,
    pub property_relationship: PropertyRelationship,
    #[serde(default)]
    pub average_consumption: NumericInput,
    #[serde(default)]
    pub tariff: NumericInput,
    pub installation_type: InstallationType,
    pub installation_type_other: Option<String>,
    pub bill_attachment: Option<BillAttachment>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

// ============ Response Models ============

/// Decision returned to the form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub submission_id: Uuid,
    pub status: EligibilityStatus,
    pub message: String,
    pub priority: Priority,
    pub score: u8,
    pub reasons: Vec<String>,
    pub checklist: Vec<String>,
    pub municipality: Option<String>,
    /// Same applicant already submitted recently; nothing was forwarded.
    pub duplicate: bool,
}

impl DecisionResponse {
    pub fn new(
        submission_id: Uuid,
        decision: EligibilityDecision,
        municipality: Option<String>,
        duplicate: bool,
    ) -> Self {
        Self {
            submission_id,
            status: decision.status,
            message: decision.status.message().to_string(),
            priority: decision.priority,
            score: decision.score,
            reasons: decision.reasons,
            checklist: decision.checklist,
            municipality,
            duplicate,
        }
    }
}

/// Result of a postal code lookup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CepLookupResponse {
    pub cep: String,
    pub city: String,
    pub state: String,
    /// "City/UF" label used on the form and in the CRM.
    pub municipality: String,
}
