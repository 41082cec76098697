//! Field validators for the pre-qualification form.
//!
//! Every validator is total: malformed input yields `false` / `None`, never a
//! panic or an error value, so the handler can turn each failure into a
//! field-level message.

use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::sync::OnceLock;

/// Canonical accepted WhatsApp length range, in digits.
pub const PHONE_DIGITS_MIN: usize = 11;
pub const PHONE_DIGITS_MAX: usize = 13;
/// Legacy lower bound still tolerated by some form versions.
pub const LEGACY_PHONE_DIGITS_MIN: usize = 10;

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn cep_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}-\d{3}$").expect("valid CEP regex"))
}

/// Keeps ASCII digits only: "123.456.789-09" -> "12345678909".
pub fn only_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn cpf_check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 {
        0
    } else {
        rest
    }
}

fn cnpj_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let digit = 11 - (sum % 11);
    if digit >= 10 {
        0
    } else {
        digit
    }
}

/// Validates an 11-digit CPF (individual taxpayer ID).
pub fn is_valid_cpf(raw: &str) -> bool {
    let digits = digits_of(&only_digits(raw));
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }

    let first = cpf_check_digit(&digits[..9]);
    let second = cpf_check_digit(&digits[..10]);
    digits[9] == first && digits[10] == second
}

/// Validates a 14-digit CNPJ (company taxpayer ID).
pub fn is_valid_cnpj(raw: &str) -> bool {
    let digits = digits_of(&only_digits(raw));
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }

    let first = cnpj_check_digit(&digits[..12], &CNPJ_FIRST_WEIGHTS);
    let second = cnpj_check_digit(&digits[..13], &CNPJ_SECOND_WEIGHTS);
    digits[12] == first && digits[13] == second
}

/// Validates a CPF or CNPJ, dispatching on the digit count.
pub fn is_valid_document(raw: &str) -> bool {
    match only_digits(raw).len() {
        11 => is_valid_cpf(raw),
        14 => is_valid_cnpj(raw),
        _ => false,
    }
}

/// Masks a document for logs: "12345678909" -> "123*****909".
pub fn mask_document(raw: &str) -> String {
    let digits = only_digits(raw);
    if digits.len() < 6 {
        return "*".repeat(digits.len());
    }
    format!(
        "{}{}{}",
        &digits[..3],
        "*".repeat(digits.len() - 6),
        &digits[digits.len() - 3..]
    )
}

/// Validates a WhatsApp number by digit count.
///
/// The canonical range is 11–13 digits (DDD + 9-digit mobile, optionally
/// prefixed by 55). `allow_legacy` also accepts 10 digits.
pub fn is_valid_phone(raw: &str, allow_legacy: bool) -> bool {
    let len = only_digits(raw).len();
    let min = if allow_legacy {
        LEGACY_PHONE_DIGITS_MIN
    } else {
        PHONE_DIGITS_MIN
    };
    (min..=PHONE_DIGITS_MAX).contains(&len)
}

/// Normalizes a Brazilian number to E.164 (+5511987654321).
///
/// Returns `None` when libphonenumber does not recognize the number; callers
/// then fall back to the raw digits.
pub fn normalize_br_phone(raw: &str) -> Option<String> {
    let digits = only_digits(raw);
    if digits.is_empty() {
        return None;
    }

    match phonenumber::parse(Some(CountryId::BR), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::E164).to_string();
            tracing::debug!("Normalized BR phone to {}", formatted);
            Some(formatted)
        }
        Ok(_) => {
            tracing::debug!("Phone not recognized as a valid BR number");
            None
        }
        Err(e) => {
            tracing::debug!("Failed to parse BR phone: {:?}", e);
            None
        }
    }
}

/// Basic `local@domain.tld` check; no RFC 5322 compliance.
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

/// Normalizes a CEP to `NNNNN-NNN`, or `None` if it has the wrong shape.
pub fn normalize_cep(raw: &str) -> Option<String> {
    let digits = only_digits(raw);
    if digits.len() != 8 {
        return None;
    }
    let formatted = format!("{}-{}", &digits[..5], &digits[5..]);
    cep_regex().is_match(&formatted).then_some(formatted)
}

fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parses monthly consumption in kWh; rounds up; rejects zero, negatives and
/// non-numeric input.
pub fn parse_consumption(raw: &str) -> Option<u32> {
    let value = parse_decimal(raw)?;
    if value <= 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value.ceil() as u32)
}

/// Parses a tariff in currency per kWh, rounded to two decimals.
///
/// Range checks belong to the evaluator, not here.
pub fn parse_tariff(raw: &str) -> Option<f64> {
    let value = parse_decimal(raw)?;
    let rounded = (value * 100.0).round() / 100.0;
    rounded.is_finite().then_some(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpf_known_values() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("11144477735"));
        assert!(!is_valid_cpf("529.982.247-26"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234567890"));
    }

    #[test]
    fn test_cnpj_known_values() {
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        assert!(is_valid_cnpj("11444777000161"));
        assert!(!is_valid_cnpj("11.222.333/0001-82"));
        assert!(!is_valid_cnpj("00000000000000"));
    }

    #[test]
    fn test_document_dispatch() {
        assert!(is_valid_document("52998224725"));
        assert!(is_valid_document("11222333000181"));
        assert!(!is_valid_document("529982247"));
        assert!(!is_valid_document(""));
    }

    #[test]
    fn test_mask_document() {
        assert_eq!(mask_document("529.982.247-25"), "529*****725");
        assert_eq!(mask_document("123"), "***");
    }

    #[test]
    fn test_phone_length_policies() {
        assert!(is_valid_phone("(11) 98765-4321", false));
        assert!(is_valid_phone("+55 11 98765-4321", false));
        assert!(!is_valid_phone("(11) 3333-4444", false));
        assert!(is_valid_phone("(11) 3333-4444", true));
        assert!(!is_valid_phone("12345678901234", true));
        assert!(!is_valid_phone("", true));
    }

    #[test]
    fn test_email_regex() {
        assert!(is_valid_email("cliente@empresa.com.br"));
        assert!(is_valid_email("  a@b.c "));
        assert!(!is_valid_email("cliente@empresa"));
        assert!(!is_valid_email("cli ente@empresa.com"));
        assert!(!is_valid_email("@empresa.com"));
    }

    #[test]
    fn test_normalize_cep() {
        assert_eq!(normalize_cep("01310-100"), Some("01310-100".to_string()));
        assert_eq!(normalize_cep("01310100"), Some("01310-100".to_string()));
        assert_eq!(normalize_cep("0131-0100"), Some("01310-100".to_string()));
        assert_eq!(normalize_cep("0131010"), None);
    }

    #[test]
    fn test_parse_consumption() {
        assert_eq!(parse_consumption("350"), Some(350));
        assert_eq!(parse_consumption("350,2"), Some(351));
        assert_eq!(parse_consumption("350.0"), Some(350));
        assert_eq!(parse_consumption("0"), None);
        assert_eq!(parse_consumption("-5"), None);
        assert_eq!(parse_consumption("abc"), None);
        assert_eq!(parse_consumption(""), None);
    }

    #[test]
    fn test_parse_tariff() {
        assert_eq!(parse_tariff("0,956"), Some(0.96));
        assert_eq!(parse_tariff("1.2"), Some(1.2));
        assert_eq!(parse_tariff("-1"), Some(-1.0));
        assert_eq!(parse_tariff("x"), None);
        assert_eq!(parse_tariff("inf"), None);
        assert_eq!(parse_tariff("1e307"), None);
        assert_eq!(parse_tariff("-1e308"), None);
    }
}
