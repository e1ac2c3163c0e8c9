//! wiremock-backed tests for the Google geocoding and places clients.

use std::time::Duration;

use dealbot_core::{Category, Classify, ErrorKind};
use dealbot_geo::{
    GeoError, GooglePlacesClient, GoogleGeocoder, NearbyPlacesProvider, ReverseGeocoder,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn geocoder(server: &MockServer) -> GoogleGeocoder {
    GoogleGeocoder::with_base_url("test-key", Duration::from_secs(5), &server.uri())
        .expect("client construction should not fail")
}

#[tokio::test]
async fn reverse_geocode_parses_singapore_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .and(query_param("latlng", "1.3718338,103.8995563"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "349 Hougang Ave 7, Singapore 530349",
                "address_components": [
                    { "long_name": "349", "short_name": "349", "types": ["street_number"] },
                    { "long_name": "Hougang Avenue 7", "short_name": "Hougang Ave 7", "types": ["route"] },
                    { "long_name": "Hougang", "short_name": "Hougang", "types": ["neighborhood", "political"] },
                    { "long_name": "Singapore", "short_name": "SG", "types": ["country", "political"] },
                    { "long_name": "530349", "short_name": "530349", "types": ["postal_code"] }
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = geocoder(&server)
        .reverse(1.3718338, 103.8995563)
        .await
        .expect("reverse should succeed")
        .expect("result should be present");

    assert_eq!(result.country_code.as_deref(), Some("SG"));
    assert_eq!(result.postal_code.as_deref(), Some("530349"));
    assert_eq!(result.area.as_deref(), Some("Hougang"));
}

#[tokio::test]
async fn zero_results_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "ZERO_RESULTS", "results": [] })),
        )
        .mount(&server)
        .await;

    let result = geocoder(&server).reverse(0.0, 0.0).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn over_query_limit_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "OVER_QUERY_LIMIT", "results": [] })),
        )
        .mount(&server)
        .await;

    let err = geocoder(&server).reverse(1.3, 103.8).await.unwrap_err();
    assert!(matches!(err, GeoError::RateLimited { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn request_denied_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&server)
        .await;

    let err = geocoder(&server).reverse(1.3, 103.8).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("REQUEST_DENIED"));
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = geocoder(&server).reverse(1.3, 103.8).await.unwrap_err();
    assert!(err.is_transient(), "5xx should be retried: {err}");
}

#[tokio::test]
async fn nearby_places_maps_category_to_place_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/place/nearbysearch/json"))
        .and(query_param("type", "supermarket"))
        .and(query_param("radius", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [
                {
                    "name": "FairPrice Hougang",
                    "vicinity": "Hougang Ave 7",
                    "geometry": { "location": { "lat": 1.372, "lng": 103.899 } }
                },
                { "name": "Sheng Siong" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        GooglePlacesClient::with_base_url("test-key", Duration::from_secs(5), &server.uri())
            .unwrap();
    let places = client.nearby(1.37, 103.89, Category::Groceries).await.unwrap();

    assert_eq!(places.len(), 2);
    assert_eq!(places[0].name, "FairPrice Hougang");
    assert_eq!(places[0].latitude, Some(1.372));
    assert!(places[1].latitude.is_none());
}
