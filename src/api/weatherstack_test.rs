//! Tests for the Weatherstack client against a local mock server.

use crate::api::{WeatherProvider, WeatherstackClient};
use crate::error::AppError;
use mockito::Matcher;
use serde_json::json;

/// A realistic `/current` response body, trimmed to the fields we care about
/// plus a few extras the deserializer must ignore.
fn current_body() -> serde_json::Value {
    json!({
        "request": {
            "type": "City",
            "query": "Paris, France",
            "language": "en",
            "unit": "m"
        },
        "location": {
            "name": "Paris",
            "country": "France",
            "timezone_id": "Europe/Paris"
        },
        "current": {
            "observation_time": "12:14 PM",
            "temperature": 13.0,
            "weather_code": 113,
            "weather_descriptions": ["Sunny", "Clear"],
            "feelslike": 11.0,
            "humidity": 71,
            "wind_speed": 9.0,
            "wind_degree": 320,
            "wind_dir": "NW",
            "pressure": 1011,
            "uv_index": 4
        }
    })
}

#[tokio::test]
async fn current_weather_parses_reading() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/current")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("access_key".into(), "test-key".into()),
            Matcher::UrlEncoded("query".into(), "Paris,FR".into()),
            Matcher::UrlEncoded("units".into(), "m".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(current_body().to_string())
        .create_async()
        .await;

    let client = WeatherstackClient::new_with_base_url("test-key".to_string(), &server.url());
    let observation = client.current_weather("Paris", "FR").await.unwrap();

    mock.assert_async().await;
    assert!((observation.temperature - 13.0).abs() < 1e-9);
    assert!((observation.feels_like - 11.0).abs() < 1e-9);
    assert_eq!(observation.humidity, 71);
    assert!((observation.wind_speed - 9.0).abs() < 1e-9);
    assert_eq!(observation.wind_direction, "NW");
    assert_eq!(observation.description, "Sunny");
}

#[tokio::test]
async fn current_weather_surfaces_embedded_error_body() {
    // Weatherstack signals most failures as HTTP 200 with an error object.
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/current")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": false,
                "error": {
                    "code": 615,
                    "type": "request_failed",
                    "info": "Your API request failed. Please try again or contact support."
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = WeatherstackClient::new_with_base_url("test-key".to_string(), &server.url());
    let err = client.current_weather("Atlantis", "XX").await.unwrap_err();

    match err {
        AppError::MalformedPayload(reason) => {
            assert!(reason.contains("request_failed"));
            assert!(reason.contains("615"));
        },
        other => panic!("expected MalformedPayload, got {other:?}"),
    }
}

#[tokio::test]
async fn current_weather_rejects_missing_current_block() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/current")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "request": { "query": "Paris, France" } }).to_string())
        .create_async()
        .await;

    let client = WeatherstackClient::new_with_base_url("test-key".to_string(), &server.url());
    let err = client.current_weather("Paris", "FR").await.unwrap_err();

    assert!(matches!(err, AppError::MalformedPayload(_)));
}

#[tokio::test]
async fn current_weather_maps_http_errors() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/current")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let client = WeatherstackClient::new_with_base_url("test-key".to_string(), &server.url());
    let err = client.current_weather("Paris", "FR").await.unwrap_err();

    assert!(matches!(err, AppError::Provider(_)));
}

#[tokio::test]
async fn current_weather_rejects_unparseable_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/current")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("<html>definitely not json</html>")
        .create_async()
        .await;

    let client = WeatherstackClient::new_with_base_url("test-key".to_string(), &server.url());
    let err = client.current_weather("Paris", "FR").await.unwrap_err();

    assert!(matches!(err, AppError::JsonParse(_)));
}
