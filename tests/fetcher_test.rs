//! Integration tests for the fetchers using wiremock and a fake neoHub
//!
//! These tests validate the fetchers' behavior against mock servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use waqt::coordinator::{CalculationMethod, ReferenceCalculator, ReferenceSource};
use waqt::fetcher::{
    Fetcher, HttpFetcher, NeoHubClient, NeoHubCommand, NeoHubFetcher, SpeakerClient,
    SpeakerCommand,
};
use waqt::utils::error::FetchError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::FakeHub;

/// Test successful fetch from mock server
#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/timetable/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::icci_timetable(common::today(), (17, 10))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(format!("{}/api/timetable/", mock_server.uri())).unwrap();
    let payload = fetcher.fetch().await.unwrap();

    let json = payload.json().unwrap();
    assert!(json.get("timetable").is_some());
}

/// Test that non-2xx responses map to BadStatus
#[tokio::test]
async fn test_bad_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(mock_server.uri()).unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err, FetchError::BadStatus(503));
    assert!(err.is_recoverable());
}

/// Test that a non-JSON body is rejected
#[tokio::test]
async fn test_non_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new(mock_server.uri()).unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::BadPayload(_)));
}

/// Test timeout handling
#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let fetcher =
        HttpFetcher::with_timeout(mock_server.uri(), Duration::from_millis(200)).unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::Unreachable(_)), "got {err:?}");
}

/// Test connection refused
#[tokio::test]
async fn test_unreachable() {
    let fetcher = HttpFetcher::new("http://127.0.0.1:1/").unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::Unreachable(_)));
}

/// Test the calculation request and reference extraction
#[tokio::test]
async fn test_reference_calculator() {
    let mock_server = MockServer::start().await;
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/timings/05-03-2024"))
        .and(query_param("method", "2"))
        .and(query_param("latitude", "53.35"))
        .and(query_param("timezonestring", "Europe/Dublin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::aladhan_timings("18:12", "00:21")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let calculator = ReferenceCalculator::new(
        format!("{}/v1", mock_server.uri()),
        53.35,
        -6.26,
        CalculationMethod::Isna,
        chrono_tz::Europe::Dublin,
    )
    .unwrap();

    let reference = calculator.reference_times(date).await.unwrap();
    assert_eq!(reference.maghrib.as_deref(), Some("18:12"));
    assert_eq!(reference.midnight, "00:21");
    assert_eq!(reference.prayers.len(), 9);
}

/// Test that a failed calculation falls back to midnight 00:00
#[tokio::test]
async fn test_reference_default_on_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let calculator = ReferenceCalculator::new(
        mock_server.uri(),
        53.35,
        -6.26,
        CalculationMethod::Isna,
        chrono_tz::UTC,
    )
    .unwrap();

    let reference = calculator.reference_or_default(common::today()).await;
    assert_eq!(reference.midnight, "00:00");
    assert!(reference.maghrib.is_none());
    assert!(!reference.has_prayers());
}

/// Test speaker command routing
#[tokio::test]
async fn test_speaker_command() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/setVolume"))
        .and(query_param("volume", "0.4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SpeakerClient::new(mock_server.uri()).unwrap();
    let body = client
        .send_command(&SpeakerCommand::SetVolume { volume: 0.4 })
        .await
        .unwrap();
    assert_eq!(body.as_bytes(), b"OK");

    // Out of range volumes never reach the speaker
    assert!(client
        .send_command(&SpeakerCommand::SetVolume { volume: 1.5 })
        .await
        .is_err());
}

/// Test neoHub status polling against a fake hub
#[tokio::test]
async fn test_neohub_fetch() {
    let hub = FakeHub::start().await;
    let client = Arc::new(NeoHubClient::new("127.0.0.1", hub.port));

    let payload = NeoHubFetcher::new(client).fetch().await.unwrap();
    let json = payload.json().unwrap();

    assert_eq!(json["Lounge"]["CURRENT_TEMPERATURE"], "21.5");
    assert_eq!(json["Lounge"]["engineers_data"]["FROST TEMPERATURE"], 12);
    assert!(json.get("Lamp").is_some());
}

/// Test neoHub command framing
#[tokio::test]
async fn test_neohub_command() {
    let hub = FakeHub::start().await;
    let client = NeoHubClient::new("127.0.0.1", hub.port);

    let response = client
        .send_command(&NeoHubCommand::Standby {
            device: "Lounge".to_string(),
            on: true,
        })
        .await
        .unwrap();

    assert_eq!(response["result"], "ok");
    assert_eq!(hub.commands(), vec![r#"{"FROST_ON":"Lounge"}"#.to_string()]);
}

/// Test that an unreachable hub is reported as such
#[tokio::test]
async fn test_neohub_unreachable() {
    let client = NeoHubClient::with_timeout("127.0.0.1", 1, Duration::from_millis(500));
    let err = client
        .json_request(&serde_json::json!({ "INFO": 0 }))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Unreachable(_)));
}
