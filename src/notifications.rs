//! Message bodies for the lead e-mail and the WhatsApp alert.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::eligibility::EligibilityDecision;
use crate::intake::ValidatedSubmission;

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "sim"
    } else {
        "não"
    }
}

pub fn email_subject(submission: &ValidatedSubmission, decision: &EligibilityDecision) -> String {
    format!(
        "[{}] Novo lead leasing solar - {} ({} kWh/mês)",
        decision.status.label(),
        submission.name,
        submission.consumption_kwh
    )
}

fn row(html: &mut String, label: &str, value: &str) {
    html.push_str(&format!(
        "<tr><td style=\"padding:4px 8px;font-weight:bold\">{}</td><td style=\"padding:4px 8px\">{}</td></tr>",
        escape_html(label),
        escape_html(value)
    ));
}

fn list(html: &mut String, title: &str, items: &[String]) {
    html.push_str(&format!("<h3>{}</h3><ul>", escape_html(title)));
    for item in items {
        html.push_str(&format!("<li>{}</li>", escape_html(item)));
    }
    html.push_str("</ul>");
}

/// Full lead e-mail for the sales inbox.
pub fn email_html(
    submission_id: Uuid,
    submitted_at: DateTime<Utc>,
    submission: &ValidatedSubmission,
    decision: &EligibilityDecision,
) -> String {
    let mut html = String::new();
    html.push_str("<h2>Novo lead - Leasing Solar</h2>");
    html.push_str(&format!(
        "<p>Status: <strong>{}</strong> | Prioridade: <strong>{}</strong> | Score: {}</p>",
        decision.status.label(),
        decision.priority.label(),
        decision.score
    ));

    html.push_str("<table>");
    row(&mut html, "Protocolo", &submission_id.to_string());
    row(
        &mut html,
        "Recebido em",
        &submitted_at.format("%d/%m/%Y %H:%M UTC").to_string(),
    );
    row(&mut html, "Nome", &submission.name);
    row(
        &mut html,
        "CPF/CNPJ",
        &format!(
            "{} ({})",
            submission.document,
            if submission.document_valid { "válido" } else { "inválido" }
        ),
    );
    row(&mut html, "WhatsApp", &submission.whatsapp);
    row(&mut html, "E-mail", &submission.email);
    row(&mut html, "CEP", &submission.cep);
    row(
        &mut html,
        "Município",
        submission.municipality.as_deref().unwrap_or("não identificado"),
    );
    row(
        &mut html,
        "Tipo de cliente",
        &submission.customer_category_label(),
    );
    row(
        &mut html,
        "Vínculo com o imóvel",
        submission.property_relationship.label(),
    );
    row(
        &mut html,
        "Consumo médio",
        &format!("{} kWh/mês", submission.consumption_kwh),
    );
    row(
        &mut html,
        "Tarifa",
        &format!("R$ {:.2}/kWh", submission.tariff),
    );
    row(&mut html, "Instalação", &submission.installation_label());
    row(
        &mut html,
        "Conta de energia anexada",
        yes_no(submission.attachment.is_some()),
    );
    for (label, value) in submission.attribution.entries() {
        row(&mut html, label, value);
    }
    html.push_str("</table>");

    list(&mut html, "Motivos", &decision.reasons);
    if !decision.checklist.is_empty() {
        list(&mut html, "Documentos necessários", &decision.checklist);
    }

    html
}

/// Short alert for the sales team's WhatsApp.
pub fn whatsapp_text(submission: &ValidatedSubmission, decision: &EligibilityDecision) -> String {
    let mut text = String::new();
    text.push_str("☀️ Novo lead - Leasing Solar\n\n");
    text.push_str(&format!("👤 {}\n", submission.name));
    text.push_str(&format!("📱 {}\n", submission.whatsapp));
    if let Some(municipality) = &submission.municipality {
        text.push_str(&format!("📍 {}\n", municipality));
    }
    text.push_str(&format!(
        "⚡ {} kWh/mês | R$ {:.2}/kWh\n",
        submission.consumption_kwh, submission.tariff
    ));
    text.push_str(&format!(
        "📊 {} | prioridade {}\n",
        decision.status.label(),
        decision.priority.label()
    ));
    text
}
