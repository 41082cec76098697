/// Property-based tests using proptest
/// Validators must be total and the evaluator must respect its bands for any input
use proptest::prelude::*;
use solar_leads_api::eligibility::{
    evaluate, EligibilityInput, EligibilityStatus, Priority, REASON_HARD_FLOOR,
};
use solar_leads_api::models::{InstallationType, PropertyRelationship};
use solar_leads_api::validation::{
    is_valid_document, is_valid_email, is_valid_phone, normalize_br_phone, normalize_cep,
    parse_consumption, parse_tariff,
};

fn installation() -> impl Strategy<Value = InstallationType> {
    prop_oneof![
        Just(InstallationType::CeramicRoof),
        Just(InstallationType::FiberCementRoof),
        Just(InstallationType::MetalRoof),
        Just(InstallationType::Slab),
        Just(InstallationType::Ground),
        Just(InstallationType::GroundSlab),
        Just(InstallationType::Other),
    ]
}

fn relationship() -> impl Strategy<Value = PropertyRelationship> {
    (0usize..PropertyRelationship::ALL.len()).prop_map(|i| PropertyRelationship::ALL[i])
}

prop_compose! {
    fn any_input(consumption: std::ops::Range<u32>)(
        consumption_kwh in consumption,
        tariff in 0.0f64..5.0,
        flags in proptest::array::uniform5(proptest::bool::ANY),
        installation in installation(),
        relationship in relationship(),
    ) -> EligibilityInput {
        EligibilityInput {
            consumption_kwh,
            tariff,
            document_valid: flags[0],
            phone_valid: flags[1],
            email_valid: flags[2],
            cep_valid: flags[3],
            bill_attached: flags[4],
            installation,
            relationship,
        }
    }
}

// Property: Validators never panic
proptest! {
    #[test]
    fn validators_never_panic(raw in "\\PC*") {
        let _ = is_valid_document(&raw);
        let _ = is_valid_email(&raw);
        let _ = is_valid_phone(&raw, false);
        let _ = normalize_br_phone(&raw);
        let _ = normalize_cep(&raw);
        let _ = parse_consumption(&raw);
        if let Some(tariff) = parse_tariff(&raw) {
            prop_assert!(tariff.is_finite());
        }
    }

    #[test]
    fn parsed_tariff_is_always_finite(value in proptest::num::f64::ANY) {
        if let Some(tariff) = parse_tariff(&value.to_string()) {
            prop_assert!(tariff.is_finite());
        }
    }

    #[test]
    fn phone_validity_follows_digit_count(digits in "[0-9]{0,16}", legacy in proptest::bool::ANY) {
        let min = if legacy { 10 } else { 11 };
        let expected = (min..=13).contains(&digits.len());
        prop_assert_eq!(is_valid_phone(&digits, legacy), expected);
    }

    #[test]
    fn consumption_is_ceiling_of_positive_input(whole in 1u32..100_000, cents in 0u32..100) {
        let raw = format!("{},{:02}", whole, cents);
        let expected = if cents == 0 { whole } else { whole + 1 };
        prop_assert_eq!(parse_consumption(&raw), Some(expected));
    }

    #[test]
    fn formatted_cep_normalizes(prefix in "[0-9]{5}", suffix in "[0-9]{3}") {
        let expected = format!("{}-{}", prefix, suffix);
        prop_assert_eq!(normalize_cep(&format!("{}{}", prefix, suffix)), Some(expected.clone()));
        prop_assert_eq!(normalize_cep(&expected), Some(expected));
    }
}

// Property: Evaluator bands and dominance
proptest! {
    #[test]
    fn priority_follows_consumption(input in any_input(0..5_000)) {
        let expected = match input.consumption_kwh {
            c if c >= 800 => Priority::High,
            c if c >= 300 => Priority::Medium,
            _ => Priority::Low,
        };
        prop_assert_eq!(evaluate(&input).priority, expected);
    }

    #[test]
    fn hard_floor_always_wins(input in any_input(0..200)) {
        let decision = evaluate(&input);
        prop_assert_eq!(decision.status, EligibilityStatus::NotEligible);
        prop_assert_eq!(decision.reasons, vec![REASON_HARD_FLOOR.to_string()]);
    }

    #[test]
    fn decisions_always_explain_themselves(input in any_input(0..5_000)) {
        let decision = evaluate(&input);
        prop_assert!(!decision.reasons.is_empty());
        prop_assert!(decision.score <= 100);
        prop_assert_eq!(decision, evaluate(&input));
    }
}
