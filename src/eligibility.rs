//! Lead eligibility / pre-qualification rules.
//!
//! This is the only place the rules live. The full submission flow and the
//! simulator endpoint both call [`evaluate`]; neither carries its own copy.

use serde::{Deserialize, Serialize};

use crate::models::{InstallationType, PropertyRelationship};

/// Below this, a lead is never eligible.
pub const HARD_FLOOR_KWH: u32 = 200;
/// Standard minimum; between the floors a lead is reviewed case by case.
pub const SOFT_FLOOR_KWH: u32 = 300;
/// Consumption from which a lead is high priority.
pub const HIGH_PRIORITY_KWH: u32 = 800;
/// Typical tariff range, exclusive on both ends.
pub const TARIFF_MIN: f64 = 0.90;
pub const TARIFF_MAX: f64 = 2.50;

pub const REASON_HARD_FLOOR: &str = "Consumption below 200 kWh/month minimum.";
pub const REASON_SOFT_FLOOR: &str =
    "Consumption below standard 300 kWh/month threshold - evaluate case by case.";
pub const REASON_TARIFF_RANGE: &str = "Tariff outside typical range.";
pub const REASON_NO_BILL: &str = "Bill not submitted - manual review required.";
pub const REASON_OTHER_INSTALLATION: &str =
    "Installation type Other - viability must be validated.";
pub const REASON_STRONG_PROFILE: &str = "Strong profile for leasing.";
pub const REASON_INVALID_DOCUMENT: &str = "Invalid CPF/CNPJ.";
pub const REASON_INVALID_PHONE: &str = "Invalid WhatsApp number.";
pub const REASON_INVALID_EMAIL: &str = "Invalid e-mail.";
pub const REASON_INVALID_CEP: &str = "Invalid or unresolved CEP.";

pub const DOC_CONDOMINIUM_AUTHORIZATION: &str = "condominium minutes or authorization";
pub const DOC_OWNER_AUTHORIZATION: &str = "property owner's authorization";
pub const DOC_OWNER_IDENTITY: &str = "owner's identity document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityStatus {
    PreApproved,
    Pending,
    NotEligible,
}

impl EligibilityStatus {
    /// Fixed message shown to the applicant for each status.
    pub fn message(self) -> &'static str {
        match self {
            EligibilityStatus::PreApproved => {
                "Parabéns! Seu perfil foi pré-aprovado para o leasing solar. Nossa equipe entrará em contato em breve."
            }
            EligibilityStatus::Pending => {
                "Recebemos seus dados! Seu cadastro passará por uma análise da nossa equipe e retornaremos em breve."
            }
            EligibilityStatus::NotEligible => {
                "Obrigado pelo interesse! No momento seu perfil não atende aos critérios do leasing solar."
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EligibilityStatus::PreApproved => "PRE_APPROVED",
            EligibilityStatus::Pending => "PENDING",
            EligibilityStatus::NotEligible => "NOT_ELIGIBLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_consumption(consumption_kwh: u32) -> Self {
        if consumption_kwh >= HIGH_PRIORITY_KWH {
            Priority::High
        } else if consumption_kwh >= SOFT_FLOOR_KWH {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "Alta",
            Priority::Medium => "Média",
            Priority::Low => "Baixa",
        }
    }
}

/// Normalized applicant data, after the validators ran.
///
/// The `*_valid` flags carry the outcome of field validation; the evaluator
/// turns failures into reasons instead of rejecting the input.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityInput {
    pub consumption_kwh: u32,
    pub tariff: f64,
    pub document_valid: bool,
    pub phone_valid: bool,
    pub email_valid: bool,
    pub cep_valid: bool,
    pub bill_attached: bool,
    pub installation: InstallationType,
    pub relationship: PropertyRelationship,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityDecision {
    pub status: EligibilityStatus,
    pub reasons: Vec<String>,
    pub priority: Priority,
    pub checklist: Vec<String>,
    /// Advisory UI hint; never influences `status`.
    pub score: u8,
}

fn tariff_in_range(tariff: f64) -> bool {
    tariff > TARIFF_MIN && tariff < TARIFF_MAX
}

/// Supplementary documents required by the property relationship.
pub fn document_checklist(relationship: PropertyRelationship) -> Vec<String> {
    match relationship {
        PropertyRelationship::Owner => Vec::new(),
        PropertyRelationship::Administrator => vec![DOC_CONDOMINIUM_AUTHORIZATION.to_string()],
        PropertyRelationship::Tenant
        | PropertyRelationship::GratuitousHolder
        | PropertyRelationship::Lessee
        | PropertyRelationship::OwnerRelative => vec![
            DOC_OWNER_AUTHORIZATION.to_string(),
            DOC_OWNER_IDENTITY.to_string(),
        ],
    }
}

/// Advisory score: a tenth of the consumption, plus small boosts for a
/// favourable tariff (1.00–2.00), an attached bill and high priority.
pub fn advisory_score(input: &EligibilityInput) -> u8 {
    let mut score = (f64::from(input.consumption_kwh) / 10.0).round().min(100.0) as u32;
    if (1.00..=2.00).contains(&input.tariff) {
        score += 5;
    }
    if input.bill_attached {
        score += 5;
    }
    if Priority::from_consumption(input.consumption_kwh) == Priority::High {
        score += 10;
    }
    score.min(100) as u8
}

fn classify(input: &EligibilityInput) -> (EligibilityStatus, Vec<String>) {
    if input.consumption_kwh < HARD_FLOOR_KWH {
        return (
            EligibilityStatus::NotEligible,
            vec![REASON_HARD_FLOOR.to_string()],
        );
    }

    let invalid_fields: Vec<String> = [
        (input.document_valid, REASON_INVALID_DOCUMENT),
        (input.phone_valid, REASON_INVALID_PHONE),
        (input.email_valid, REASON_INVALID_EMAIL),
        (input.cep_valid, REASON_INVALID_CEP),
    ]
    .iter()
    .filter(|(valid, _)| !valid)
    .map(|(_, reason)| reason.to_string())
    .collect();
    if !invalid_fields.is_empty() {
        return (EligibilityStatus::NotEligible, invalid_fields);
    }

    if input.consumption_kwh < SOFT_FLOOR_KWH {
        return (
            EligibilityStatus::Pending,
            vec![REASON_SOFT_FLOOR.to_string()],
        );
    }

    let mut reasons = Vec::new();
    if !tariff_in_range(input.tariff) {
        reasons.push(REASON_TARIFF_RANGE.to_string());
    }
    if !input.bill_attached {
        reasons.push(REASON_NO_BILL.to_string());
    }
    if input.installation == InstallationType::Other {
        reasons.push(REASON_OTHER_INSTALLATION.to_string());
    }

    if reasons.is_empty() {
        (
            EligibilityStatus::PreApproved,
            vec![REASON_STRONG_PROFILE.to_string()],
        )
    } else {
        (EligibilityStatus::Pending, reasons)
    }
}

/// Evaluates a validated applicant. Pure and deterministic.
pub fn evaluate(input: &EligibilityInput) -> EligibilityDecision {
    let (status, reasons) = classify(input);

    EligibilityDecision {
        status,
        reasons,
        priority: Priority::from_consumption(input.consumption_kwh),
        checklist: document_checklist(input.relationship),
        score: advisory_score(input),
    }
}
