//! Normalizer integration tests
//!
//! Runs the source normalizers on realistic payloads and checks the DST
//! offset correction end to end.

mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;

use waqt::fetcher::RawPayload;
use waqt::models::{prayer, SnapshotValue};
use waqt::parser::offset::shift_time;
use waqt::parser::{
    offset_fix, CalculatedNormalizer, NeoHubNormalizer, NormalizeContext, Normalizer,
    ReferenceTimes, SpeakerNormalizer, TimetableNormalizer, WordpressDayListNormalizer,
    WordpressTodayNormalizer,
};
use waqt::utils::error::ParseError;

fn reference(maghrib: &str) -> ReferenceTimes {
    ReferenceTimes::from_prayers(BTreeMap::from([
        (prayer::MAGHRIB.to_string(), maghrib.to_string()),
        (prayer::MIDNIGHT.to_string(), "23:40".to_string()),
    ]))
}

fn dublin_ctx(date: NaiveDate) -> NormalizeContext {
    NormalizeContext {
        source: "icci".to_string(),
        today: date,
        tz: chrono_tz::Europe::Dublin,
        reference: None,
    }
}

#[test]
fn test_offset_examples() {
    assert_eq!(offset_fix("17:10", "16:07"), -1);
    assert_eq!(offset_fix("16:10", "16:07"), 0);
    assert_eq!(offset_fix("15:05", "16:07"), 1);
    assert_eq!(shift_time("06:00", -1).as_deref(), Some("05:00"));
}

#[test]
fn test_timetable_hour_late_is_corrected() {
    // Before the switch to summer time, the timetable is already an hour ahead
    let date = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
    let ctx = dublin_ctx(date).with_reference(reference("16:07"));
    let payload = RawPayload::from_json(&common::icci_timetable(date, (17, 10))).unwrap();

    let snapshot = TimetableNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(
        snapshot.instant(prayer::FAJR),
        Some(Utc.with_ymd_and_hms(2024, 3, 28, 5, 0, 0).unwrap())
    );
    assert_eq!(
        snapshot.instant(prayer::MAGHRIB),
        Some(Utc.with_ymd_and_hms(2024, 3, 28, 16, 10, 0).unwrap())
    );
    assert_eq!(snapshot.instant(prayer::SUNSET), snapshot.instant(prayer::MAGHRIB));
    assert_eq!(snapshot.instant(prayer::IMSAK), snapshot.instant(prayer::MAGHRIB));
    assert_eq!(
        snapshot.instant(prayer::MIDNIGHT),
        Some(Utc.with_ymd_and_hms(2024, 3, 28, 23, 40, 0).unwrap())
    );
}

#[test]
fn test_timetable_within_tolerance_unchanged() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let ctx = dublin_ctx(date).with_reference(reference("16:07"));
    let payload = RawPayload::from_json(&common::icci_timetable(date, (16, 10))).unwrap();

    let snapshot = TimetableNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(
        snapshot.instant(prayer::FAJR),
        Some(Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap())
    );
}

#[test]
fn test_timetable_without_reference_uses_default_midnight() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let ctx = dublin_ctx(date);
    let payload = RawPayload::from_json(&common::icci_timetable(date, (16, 10))).unwrap();

    let snapshot = TimetableNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(
        snapshot.instant(prayer::MIDNIGHT),
        Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
    );
}

#[test]
fn test_timetable_missing_day() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let other = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
    let payload = RawPayload::from_json(&common::icci_timetable(other, (16, 10))).unwrap();

    let err = TimetableNormalizer
        .normalize(&payload, &dublin_ctx(date))
        .unwrap_err();
    assert!(matches!(err, ParseError::NoMatch(_)));
}

#[test]
fn test_wordpress_year_finds_today() {
    let date = NaiveDate::from_ymd_opt(2024, 12, 23).unwrap();
    let payload = RawPayload::from_json(&common::wordpress_year(date)).unwrap();

    let snapshot = WordpressDayListNormalizer
        .normalize(&payload, &dublin_ctx(date))
        .unwrap();

    assert_eq!(
        snapshot.instant("fajr_begins"),
        Some(Utc.with_ymd_and_hms(2024, 12, 23, 6, 5, 0).unwrap())
    );
    assert_eq!(snapshot.text("hijri_date"), Some("1445-06-12"));
    assert_eq!(snapshot.text("is_ramadan"), Some("0"));
    assert!(snapshot.get("d_date").is_none());
}

#[test]
fn test_wordpress_year_no_entry_for_today() {
    let date = NaiveDate::from_ymd_opt(2024, 12, 23).unwrap();
    let payload = RawPayload::from_json(&common::wordpress_year(date)).unwrap();
    let later = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

    let err = WordpressDayListNormalizer
        .normalize(&payload, &dublin_ctx(later))
        .unwrap_err();
    assert!(matches!(err, ParseError::NoMatch(_)));
}

#[test]
fn test_wordpress_year_wrong_shape() {
    let payload = RawPayload::from_json(&serde_json::json!({ "error": "rate limited" })).unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 12, 23).unwrap();

    let err = WordpressDayListNormalizer
        .normalize(&payload, &dublin_ctx(date))
        .unwrap_err();
    assert!(matches!(err, ParseError::FieldError { .. }));
}

#[test]
fn test_wordpress_today() {
    let ctx = NormalizeContext::new("mosque", chrono_tz::UTC, Utc::now())
        .with_reference(reference("16:40"));
    let payload = RawPayload::from_json(&common::wordpress_today()).unwrap();

    let snapshot = WordpressTodayNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(snapshot.len(), 9);
    let fajr = snapshot.instant(prayer::FAJR).unwrap();
    assert_eq!(fajr.format("%H:%M").to_string(), "06:05");
}

#[test]
fn test_calculated() {
    let ctx = NormalizeContext::new("prayer_times", chrono_tz::UTC, Utc::now());
    let payload = RawPayload::from_json(&common::aladhan_timings("16:07", "23:58")).unwrap();

    let snapshot = CalculatedNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(snapshot.len(), prayer::ALL.len());
    assert_eq!(
        snapshot.instant(prayer::MIDNIGHT).unwrap().format("%H:%M").to_string(),
        "23:58"
    );
}

#[test]
fn test_neohub_skips_plugs() {
    let ctx = NormalizeContext::new("hub", chrono_tz::UTC, Utc::now());
    let merged = waqt::fetcher::NeoHubFetcher::merge(
        &common::neohub_info(),
        Some(&common::neohub_engineers()),
    )
    .unwrap();
    let payload = RawPayload::from_json(&merged).unwrap();

    let snapshot = NeoHubNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(snapshot.number("Lounge.current_temperature"), Some(21.5));
    assert_eq!(snapshot.number("Lounge.hold_temperature"), Some(19.0));
    assert_eq!(snapshot.number("Lounge.frost_temperature"), Some(12.0));
    assert_eq!(snapshot.text("Lounge.hvac_action"), Some("heating"));
    assert_eq!(snapshot.text("Lounge.temperature_unit"), Some("C"));
    assert_eq!(
        snapshot.get("devices"),
        Some(&SnapshotValue::List(vec!["Lounge".to_string()]))
    );
    assert!(snapshot.get("Lamp.current_temperature").is_none());
}

#[test]
fn test_speaker_status() {
    let ctx = NormalizeContext::new("kitchen", chrono_tz::UTC, Utc::now());
    let payload = RawPayload::from_json(&common::speaker_status()).unwrap();

    let snapshot = SpeakerNormalizer.normalize(&payload, &ctx).unwrap();

    assert_eq!(snapshot.text("state"), Some("playing"));
    assert_eq!(snapshot.number("volume"), Some(0.4));
    assert_eq!(snapshot.text("current_priority"), Some("5"));
    assert_eq!(snapshot.number("position"), Some(12.5));
    assert_eq!(
        snapshot.get("sources"),
        Some(&SnapshotValue::List(vec![
            "adhan".to_string(),
            "radio".to_string(),
            "tv".to_string()
        ]))
    );
}

fn hhmm() -> impl Strategy<Value = String> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| format!("{h:02}:{m:02}"))
}

proptest! {
    #[test]
    fn prop_offset_is_bounded(a in hhmm(), b in hhmm()) {
        let offset = offset_fix(&a, &b);
        prop_assert!((-1..=1).contains(&offset));
    }

    #[test]
    fn prop_offset_is_antisymmetric(a in hhmm(), b in hhmm()) {
        let forward = offset_fix(&a, &b);
        if forward != 0 {
            prop_assert_eq!(offset_fix(&b, &a), -forward);
        }
    }
}
