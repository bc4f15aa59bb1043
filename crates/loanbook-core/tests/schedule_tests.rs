use chrono::NaiveDate;
use loanbook_core::schedule::generator::{self, LoanTerms, RoundingPolicy, ScheduleInput, ScheduleOptions};
use loanbook_core::{Frequency, LoanBookError};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Schedule generation tests
// ===========================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn terms(principal: Decimal, rate: Decimal, term_months: u32, frequency: Frequency) -> LoanTerms {
    LoanTerms {
        principal,
        interest_rate_pct: rate,
        term_months,
        frequency,
        disbursement_date: date(2024, 5, 31),
    }
}

#[test]
fn test_instalment_counts_for_1200_at_10_pct() {
    let cases = [
        (Frequency::Monthly, 12u32),
        (Frequency::Weekly, 52),
        (Frequency::Daily, 360),
    ];
    for (frequency, expected) in cases {
        let out = generator::generate(
            "L1",
            &terms(dec!(1200), dec!(10), 12, frequency),
            &ScheduleOptions::default(),
        )
        .unwrap();
        assert_eq!(out.num_instalments, expected, "{frequency}");
        assert_eq!(out.entries.len(), expected as usize, "{frequency}");
        assert_eq!(out.total_interest, dec!(120));
        assert_eq!(out.total_payable, dec!(1320));
    }
}

#[test]
fn test_schedule_sum_tracks_total_payable() {
    let epsilon = dec!(0.00000000000000000001);
    for frequency in [Frequency::Monthly, Frequency::Weekly, Frequency::Daily] {
        for (principal, rate, term) in [
            (dec!(1000), dec!(12), 6u32),
            (dec!(2500.55), dec!(17.5), 7),
            (dec!(99.99), dec!(0), 1),
        ] {
            let out = generator::generate(
                "L1",
                &terms(principal, rate, term, frequency),
                &ScheduleOptions::default(),
            )
            .unwrap();
            let n = Decimal::from(out.num_instalments);
            let sum: Decimal = out.entries.iter().map(|e| e.amount_due).sum();
            assert!((sum - out.instalment_amount * n).abs() < n * epsilon);
            assert!((sum - out.total_payable).abs() < n * epsilon);
        }
    }
}

#[test]
fn test_rounded_schedule_sums_exactly() {
    let options = ScheduleOptions {
        rounding: RoundingPolicy::LastAbsorbsRemainder { decimal_places: 2 },
    };
    for frequency in [Frequency::Monthly, Frequency::Weekly, Frequency::Daily] {
        let out = generator::generate("L1", &terms(dec!(2500.55), dec!(17.5), 7, frequency), &options)
            .unwrap();
        let sum: Decimal = out.entries.iter().map(|e| e.amount_due).sum();
        assert_eq!(sum, out.total_payable, "{frequency}");
        assert!(out.entries.iter().all(|e| e.amount_due > Decimal::ZERO));
    }
}

#[test]
fn test_month_end_disbursement_schedule() {
    let out = generator::generate(
        "L1",
        &terms(dec!(1200), dec!(10), 4, Frequency::Monthly),
        &ScheduleOptions::default(),
    )
    .unwrap();
    let dates: Vec<NaiveDate> = out.entries.iter().map(|e| e.due_date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 6, 30), date(2024, 7, 31), date(2024, 8, 31), date(2024, 9, 30)]
    );
}

#[test]
fn test_dates_increase_and_numbers_are_contiguous() {
    for frequency in [Frequency::Monthly, Frequency::Weekly, Frequency::Daily] {
        let out = generator::generate(
            "L1",
            &terms(dec!(500), dec!(5), 24, frequency),
            &ScheduleOptions::default(),
        )
        .unwrap();
        let numbers: Vec<u32> = out.entries.iter().map(|e| e.instalment_number).collect();
        let expected: Vec<u32> = (1..=out.num_instalments).collect();
        assert_eq!(numbers, expected);
        assert!(out.entries.windows(2).all(|w| w[0].due_date < w[1].due_date));
    }
}

#[test]
fn test_invalid_terms_produce_nothing() {
    let bad = [
        (terms(dec!(0), dec!(10), 12, Frequency::Monthly), "principal"),
        (terms(dec!(100), dec!(-1), 12, Frequency::Monthly), "interest_rate_pct"),
        (terms(dec!(100), dec!(10), 0, Frequency::Weekly), "term_months"),
    ];
    for (t, expected_field) in bad {
        match generator::generate("L1", &t, &ScheduleOptions::default()) {
            Err(LoanBookError::InvalidInput { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("Expected InvalidInput for {expected_field}, got {:?}", other),
        }
    }
}

#[test]
fn test_unknown_frequency_string() {
    let err = "biweekly".parse::<Frequency>().unwrap_err();
    assert!(matches!(err, LoanBookError::InvalidInput { .. }));
}

#[test]
fn test_generate_schedule_envelope_from_json() {
    let json = r#"{
        "loan_id": "L42",
        "principal": "1000",
        "interest_rate_pct": "12",
        "term_months": 6,
        "frequency": "monthly",
        "disbursement_date": "2024-01-15",
        "options": { "rounding": { "policy": "last_absorbs_remainder", "decimal_places": 2 } }
    }"#;
    let input: ScheduleInput = serde_json::from_str(json).unwrap();
    let out = generator::generate_schedule(&input).unwrap();
    assert_eq!(out.result.total_payable, dec!(1060));
    assert_eq!(out.result.entries[0].id, "L42-1");
    assert_eq!(out.result.entries[5].amount_due, dec!(176.65));
    assert!(out.warnings.is_empty());
}

#[test]
fn test_preview_schedule_envelope() {
    let out = generator::preview_schedule(&terms(dec!(1200), dec!(10), 12, Frequency::Weekly)).unwrap();
    assert_eq!(out.result.num_instalments, 52);
    assert_eq!(out.result.first_due_date, date(2024, 6, 7));
}
