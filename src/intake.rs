//! Turns a raw form submission into normalized, validated applicant data.
//!
//! Structural problems (empty name, unparseable numbers, missing "Other"
//! descriptions, bad attachments) reject the submission with field errors.
//! Contact-data problems (document, phone, e-mail, postal code) do not: they
//! are recorded as flags and become reasons in the eligibility decision.

use crate::attachment::{validate_attachment, ValidatedAttachment};
use crate::crm_models::LeadSummary;
use crate::eligibility::{EligibilityDecision, EligibilityInput};
use crate::errors::{AppError, FieldError};
use crate::models::{
    Attribution, CustomerCategory, InstallationType, PreQualificationRequest,
    PropertyRelationship,
};
use crate::services::CepLookupService;
use crate::validation::{
    is_valid_document, is_valid_email, is_valid_phone, mask_document, normalize_br_phone,
    normalize_cep, only_digits, parse_consumption, parse_tariff,
};

#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub name: String,
    /// Document digits only.
    pub document: String,
    pub document_valid: bool,
    /// E.164 when recognized, else the raw digits.
    pub whatsapp: String,
    pub phone_valid: bool,
    pub email: String,
    pub email_valid: bool,
    /// `NNNNN-NNN`, or the digits as typed when malformed.
    pub cep: String,
    pub cep_valid: bool,
    pub municipality: Option<String>,
    pub customer_category: CustomerCategory,
    pub customer_category_other: Option<String>,
    pub property_relationship: PropertyRelationship,
    pub consumption_kwh: u32,
    pub tariff: f64,
    pub installation_type: InstallationType,
    pub installation_type_other: Option<String>,
    pub attachment: Option<ValidatedAttachment>,
    pub attribution: Attribution,
}

impl ValidatedSubmission {
    pub fn eligibility_input(&self) -> EligibilityInput {
        EligibilityInput {
            consumption_kwh: self.consumption_kwh,
            tariff: self.tariff,
            document_valid: self.document_valid,
            phone_valid: self.phone_valid,
            email_valid: self.email_valid,
            cep_valid: self.cep_valid,
            bill_attached: self.attachment.is_some(),
            installation: self.installation_type,
            relationship: self.property_relationship,
        }
    }

    pub fn customer_category_label(&self) -> String {
        describe(self.customer_category.label(), &self.customer_category_other)
    }

    pub fn installation_label(&self) -> String {
        describe(self.installation_type.label(), &self.installation_type_other)
    }

    pub fn masked_document(&self) -> String {
        mask_document(&self.document)
    }

    pub fn lead_summary(&self, decision: &EligibilityDecision) -> LeadSummary {
        LeadSummary {
            name: self.name.clone(),
            email: if self.email_valid {
                self.email.clone()
            } else {
                String::new()
            },
            whatsapp: if self.phone_valid {
                self.whatsapp.clone()
            } else {
                String::new()
            },
            municipality: self.municipality.clone(),
            property_type: Some(self.customer_category_label()),
            consumption_kwh: Some(self.consumption_kwh),
            system_type: Some(self.installation_label()),
            attribution: self.attribution.clone(),
            status: Some(decision.status),
            priority: Some(decision.priority),
        }
    }
}

/// "Outro (galpão)" for Other with a description, the plain label otherwise.
fn describe(label: &str, other: &Option<String>) -> String {
    match other.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(detail) => format!("{} ({})", label, detail),
        None => label.to_string(),
    }
}

fn required_description(
    value: &Option<String>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let trimmed = value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if trimmed.is_none() {
        errors.push(FieldError::new(field, "Descreva a opção \"Outro\"."));
    }
    trimmed
}

/// Validates and normalizes a submission.
///
/// The postal code is resolved through `cep_service`; "not found" and lookup
/// failures both mark it invalid.
pub async fn validate_submission(
    request: PreQualificationRequest,
    cep_service: &CepLookupService,
    allow_legacy_phone: bool,
) -> Result<ValidatedSubmission, AppError> {
    let mut errors = Vec::new();

    let name = request.name.trim().to_string();
    if name.is_empty() {
        errors.push(FieldError::new("name", "Informe seu nome."));
    }

    let consumption_kwh = parse_consumption(&request.average_consumption.as_text());
    if consumption_kwh.is_none() {
        errors.push(FieldError::new(
            "averageConsumption",
            "Informe o consumo médio mensal em kWh (maior que zero).",
        ));
    }

    let tariff = parse_tariff(&request.tariff.as_text());
    if tariff.is_none() {
        errors.push(FieldError::new("tariff", "Informe a tarifa em R$/kWh."));
    }

    let customer_category_other = match request.customer_category {
        CustomerCategory::Other => required_description(
            &request.customer_category_other,
            "customerCategoryOther",
            &mut errors,
        ),
        _ => None,
    };

    let installation_type_other = match request.installation_type {
        InstallationType::Other => required_description(
            &request.installation_type_other,
            "installationTypeOther",
            &mut errors,
        ),
        _ => None,
    };

    let attachment = match request.bill_attachment.as_ref().map(validate_attachment) {
        Some(Ok(valid)) => Some(valid),
        Some(Err(e)) => {
            errors.push(e);
            None
        }
        None => None,
    };

    let (Some(consumption_kwh), Some(tariff)) = (consumption_kwh, tariff) else {
        return Err(AppError::Validation(errors));
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let document = only_digits(&request.document);
    let document_valid = is_valid_document(&document);

    let phone_valid = is_valid_phone(&request.whatsapp, allow_legacy_phone);
    let whatsapp = normalize_br_phone(&request.whatsapp)
        .unwrap_or_else(|| only_digits(&request.whatsapp));

    let email = request.email.trim().to_lowercase();
    let email_valid = is_valid_email(&email);

    let (cep, cep_valid, municipality) = match normalize_cep(&request.cep) {
        Some(cep) => match cep_service.lookup(&cep).await {
            Ok(Some(found)) => (cep, true, Some(found.municipality)),
            Ok(None) => {
                tracing::info!("CEP {} not found; marking invalid", cep);
                (cep, false, None)
            }
            Err(e) => {
                tracing::warn!("CEP lookup failed for {}: {}", cep, e);
                (cep, false, None)
            }
        },
        None => (only_digits(&request.cep), false, None),
    };

    tracing::debug!(
        "Submission validated: document={} valid={}, phone={}, email={}, cep={}",
        mask_document(&document),
        document_valid,
        phone_valid,
        email_valid,
        cep_valid
    );

    Ok(ValidatedSubmission {
        name,
        document,
        document_valid,
        whatsapp,
        phone_valid,
        email,
        email_valid,
        cep,
        cep_valid,
        municipality,
        customer_category: request.customer_category,
        customer_category_other,
        property_relationship: request.property_relationship,
        consumption_kwh,
        tariff,
        installation_type: request.installation_type,
        installation_type_other,
        attachment,
        attribution: request.attribution,
    })
}
