use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::errors::FieldError;
use crate::models::BillAttachment;

/// Maximum decoded size of an uploaded energy bill.
pub const MAX_ATTACHMENT_BYTES: usize = 7 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

const FIELD: &str = "billAttachment";

/// A bill that passed type and size checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ValidatedAttachment {
    /// Re-encodes the file for providers that take base64 content.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Strips an optional `data:<mime>;base64,` prefix.
fn strip_data_url(content: &str) -> &str {
    let content = content.trim();
    if content.starts_with("data:") {
        if let Some((_, payload)) = content.split_once(";base64,") {
            return payload;
        }
    }
    content
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    if cleaned.is_empty() {
        "conta-de-energia".to_string()
    } else {
        cleaned
    }
}

/// Decodes and checks an uploaded bill: MIME whitelist, non-empty, 7 MB cap.
pub fn validate_attachment(attachment: &BillAttachment) -> Result<ValidatedAttachment, FieldError> {
    let mime_type = attachment.mime_type.trim().to_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(FieldError::new(
            FIELD,
            "Formato não suportado. Envie PDF, JPG ou PNG.",
        ));
    }

    // Reject before decoding: base64 inflates by 4/3.
    let payload = strip_data_url(&attachment.content_base64);
    if payload.len() / 4 * 3 > MAX_ATTACHMENT_BYTES + 3 {
        return Err(FieldError::new(FIELD, "Arquivo maior que 7 MB."));
    }

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| FieldError::new(FIELD, "Arquivo corrompido ou inválido."))?;

    if bytes.is_empty() {
        return Err(FieldError::new(FIELD, "Arquivo vazio."));
    }
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(FieldError::new(FIELD, "Arquivo maior que 7 MB."));
    }

    Ok(ValidatedAttachment {
        file_name: sanitize_file_name(&attachment.file_name),
        mime_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime: &str, content: String) -> BillAttachment {
        BillAttachment {
            file_name: "conta.pdf".to_string(),
            mime_type: mime.to_string(),
            content_base64: content,
        }
    }

    #[test]
    fn test_accepts_pdf() {
        let content = STANDARD.encode(b"%PDF-1.4 fake bill");
        let validated = validate_attachment(&attachment("application/pdf", content)).unwrap();
        assert_eq!(validated.bytes, b"%PDF-1.4 fake bill");
        assert_eq!(validated.file_name, "conta.pdf");
    }

    #[test]
    fn test_accepts_data_url_prefix() {
        let content = format!("data:image/png;base64,{}", STANDARD.encode([137u8, 80, 78, 71]));
        let validated = validate_attachment(&attachment("image/PNG", content)).unwrap();
        assert_eq!(validated.mime_type, "image/png");
        assert_eq!(validated.bytes.len(), 4);
    }

    #[test]
    fn test_rejects_other_mime_types() {
        let content = STANDARD.encode(b"GIF89a");
        let err = validate_attachment(&attachment("image/gif", content)).unwrap_err();
        assert_eq!(err.field, "billAttachment");
    }

    #[test]
    fn test_rejects_invalid_base64_and_empty() {
        assert!(validate_attachment(&attachment("application/pdf", "***".to_string())).is_err());
        assert!(validate_attachment(&attachment("application/pdf", String::new())).is_err());
    }

    #[test]
    fn test_size_cap() {
        let at_limit = STANDARD.encode(vec![0u8; MAX_ATTACHMENT_BYTES]);
        assert!(validate_attachment(&attachment("application/pdf", at_limit)).is_ok());

        let over = STANDARD.encode(vec![0u8; MAX_ATTACHMENT_BYTES + 1]);
        let err = validate_attachment(&attachment("application/pdf", over)).unwrap_err();
        assert!(err.message.contains("7 MB"));
    }

    #[test]
    fn test_file_name_is_sanitized() {
        let mut bill = attachment("application/pdf", STANDARD.encode(b"x"));
        bill.file_name = "../../etc/conta.pdf".to_string();
        assert_eq!(validate_attachment(&bill).unwrap().file_name, "conta.pdf");
    }
}
