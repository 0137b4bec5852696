//! Integration tests for `AppStoreClient` and the analysis pipeline.
//!
//! Uses `wiremock` to stand up a local HTTP server per test so no real
//! network traffic is made. Covers the ranking fetch (dedup, cap, empty,
//! error statuses), lookup chunking with partial and total chunk failure,
//! and the end-to-end merge/score pipeline.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nugget_appstore::{AnalysisOutcome, AppStoreClient, FetchError, LOOKUP_CHUNK_SIZE};

/// Builds a client suitable for tests: 5-second timeout, descriptive UA.
fn test_client(server: &MockServer) -> AppStoreClient {
    AppStoreClient::with_base_url(&server.uri(), 5, "nugget-test/0.1")
        .expect("failed to build test AppStoreClient")
}

/// Search response with the given ranked ids in one software bubble.
fn bubbles_json(ids: &[i64]) -> serde_json::Value {
    json!({
        "bubbles": [{
            "name": "software",
            "results": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>()
        }]
    })
}

/// Minimal valid lookup entry for one app id.
fn lookup_entry(id: i64, title: &str) -> serde_json::Value {
    json!({
        "trackId": id,
        "trackName": title,
        "artistName": "Example Labs",
        "averageUserRating": 4.2,
        "userRatingCount": 1000,
        "releaseDate": "2021-03-01T08:00:00Z",
        "currentVersionReleaseDate": "2025-01-15T08:00:00Z"
    })
}

fn lookup_json(entries: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"resultCount": entries.len(), "results": entries})
}

// ---------------------------------------------------------------------------
// Ranking fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_ranked_ids_preserves_order_and_deduplicates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&bubbles_json(&[5, 3, 5, 9, 3, 1])),
        )
        .mount(&server)
        .await;

    let ids = test_client(&server)
        .fetch_ranked_ids("fish identifier", "US", "en_us", 20, None)
        .await
        .unwrap();

    assert_eq!(ids, vec![5, 3, 9, 1]);
}

#[tokio::test]
async fn fetch_ranked_ids_enforces_cap_client_side() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&bubbles_json(&[1, 2, 3, 4, 5, 6, 7])),
        )
        .mount(&server)
        .await;

    let ids = test_client(&server)
        .fetch_ranked_ids("fish identifier", "US", "en_us", 3, None)
        .await
        .unwrap();

    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn fetch_ranked_ids_empty_bubble_is_ok_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&bubbles_json(&[])))
        .mount(&server)
        .await;

    let ids = test_client(&server)
        .fetch_ranked_ids("zqxjkwv", "US", "en_us", 20, None)
        .await
        .unwrap();

    assert!(ids.is_empty());
}

#[tokio::test]
async fn fetch_ranked_ids_sends_software_media_and_term() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("term", "fish identifier"))
        .and(query_param("country", "US"))
        .and(query_param("media", "software"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&bubbles_json(&[42])))
        .expect(1)
        .mount(&server)
        .await;

    let ids = test_client(&server)
        .fetch_ranked_ids("fish identifier", "US", "en_us", 20, None)
        .await
        .unwrap();
    assert_eq!(ids, vec![42]);
}

#[tokio::test]
async fn fetch_ranked_ids_surfaces_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_ranked_ids("fish identifier", "US", "en_us", 20, None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::UnexpectedStatus { status: 503, .. }),
        "expected UnexpectedStatus(503), got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_ranked_ids_surfaces_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_ranked_ids("fish identifier", "US", "en_us", 20, None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Deserialize { .. }));
}

// ---------------------------------------------------------------------------
// Lookup chunking
// ---------------------------------------------------------------------------

fn joined(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::test]
async fn lookup_by_ids_returns_map_keyed_by_identifier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .and(query_param("entity", "software"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&lookup_json(vec![
            lookup_entry(222, "Second"),
            lookup_entry(111, "First"),
        ])))
        .mount(&server)
        .await;

    let records = test_client(&server)
        .lookup_by_ids(&[111, 222], "US", "en_us")
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[&111].title, "First");
    assert_eq!(records[&222].title, "Second");
}

#[tokio::test]
async fn lookup_by_ids_isolates_a_failed_chunk() {
    let server = MockServer::start().await;
    let ids: Vec<i64> = (1..=150).collect();
    let (first, second) = ids.split_at(LOOKUP_CHUNK_SIZE);

    Mock::given(method("GET"))
        .and(path("/lookup"))
        .and(query_param("id", joined(first)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&lookup_json(
            first.iter().map(|id| lookup_entry(*id, "Chunk One")).collect(),
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lookup"))
        .and(query_param("id", joined(second)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let records = test_client(&server)
        .lookup_by_ids(&ids, "US", "en_us")
        .await
        .unwrap();

    assert_eq!(records.len(), first.len(), "only the healthy chunk enriches");
    assert!(records.contains_key(&1));
    assert!(!records.contains_key(&150));
}

#[tokio::test]
async fn lookup_by_ids_fails_when_every_chunk_fails() {
    let server = MockServer::start().await;
    let ids: Vec<i64> = (1..=150).collect();

    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .lookup_by_ids(&ids, "US", "en_us")
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::AllChunksFailed { chunks: 2, .. }),
        "expected AllChunksFailed over 2 chunks, got: {err:?}"
    );
}

#[tokio::test]
async fn lookup_by_ids_skips_entries_without_app_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&lookup_json(vec![
            json!({"wrapperType": "artist", "artistName": "Not An App"}),
            lookup_entry(7, "Real App"),
        ])))
        .mount(&server)
        .await;

    let records = test_client(&server)
        .lookup_by_ids(&[7], "US", "en_us")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[&7].title, "Real App");
}

// ---------------------------------------------------------------------------
// End-to-end analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyze_keyword_merges_without_losing_authoritative_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&bubbles_json(&[111, 222, 333])))
        .mount(&server)
        .await;
    // Metadata exists for 222 and 333 only, returned in scrambled order.
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&lookup_json(vec![
            lookup_entry(333, "Fish Tank Simulator"),
            lookup_entry(222, "Fish Identifier: 96% Accurate"),
        ])))
        .mount(&server)
        .await;

    let outcome = nugget_appstore::analyze_keyword(
        &test_client(&server),
        "fish identifier",
        "US",
        "en_us",
        20,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let AnalysisOutcome::Analyzed(analysis) = outcome else {
        panic!("expected Analyzed outcome");
    };
    assert_eq!(analysis.omitted_count, 1);
    let ranked: Vec<(u32, i64)> = analysis
        .results
        .iter()
        .map(|r| (r.rank, r.app_id))
        .collect();
    assert_eq!(ranked, vec![(1, 222), (2, 333)]);
    assert_eq!(analysis.results[0].title_match_score, 5);
    assert!(analysis.summary.is_some());
}

#[tokio::test]
async fn analyze_keyword_reports_no_results_for_empty_ranking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&bubbles_json(&[])))
        .mount(&server)
        .await;

    let outcome = nugget_appstore::analyze_keyword(
        &test_client(&server),
        "zqxjkwv",
        "US",
        "en_us",
        20,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, AnalysisOutcome::NoResults));
}
