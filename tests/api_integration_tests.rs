// API Integration Tests
//
// Purpose: Test all API endpoints against the bundled sample matrix
// Run with: cargo test --features api --test api_integration_tests

#[cfg(feature = "api")]
mod api_tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use taxon_key_scorer::{AppState, create_router};
    use tower::ServiceExt; // for oneshot

    // Helper: Create test app over the sample matrix
    fn create_test_app() -> axum::Router {
        let matrix_path = format!("{}/data/sample_matrix.json", env!("CARGO_MANIFEST_DIR"));
        let state = AppState::new(&matrix_path, None).expect("sample matrix should load");
        create_router(state)
    }

    // Helper: Parse JSON response
    async fn json_response(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        serde_json::from_slice(&body).expect("Failed to parse JSON")
    }

    // Helper: POST a JSON body
    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // =========================================================================
    // Section 1: Health Check and Matrix
    // =========================================================================

    #[tokio::test]
    async fn test_health_check() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = json_response(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_matrix_summary() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/api/matrix").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = json_response(response).await;
        assert_eq!(body["taxonCount"], 6);
        assert_eq!(body["traitCount"], 8);
        assert_eq!(body["traits"][0]["id"], "WINGS");
        assert_eq!(body["traits"][0]["difficulty"], 0.5);
        assert_eq!(body["traits"][5]["state"], "red");
    }

    // =========================================================================
    // Section 2: Evaluate
    // =========================================================================

    #[tokio::test]
    async fn test_evaluate_ranks_and_suggests() {
        let request = serde_json::json!({
            "selected": {"WINGS": 1, "C_RED": 1, "LENGTH": 6.5},
            "algo": "bayes"
        });
        let response = create_test_app()
            .oneshot(post_json("/api/evaluate", request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = json_response(response).await;
        assert_eq!(body["scores"][0]["taxonId"], "T1");
        assert_eq!(body["scores"].as_array().unwrap().len(), 6);

        let total: f64 = body["scores"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["post"].as_f64().unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-9);

        let suggestions = body["suggestions"].as_array().unwrap();
        assert!(!suggestions.is_empty());
        for pair in suggestions.windows(2) {
            assert!(pair[0]["score"].as_f64().unwrap() >= pair[1]["score"].as_f64().unwrap());
        }
    }

    #[tokio::test]
    async fn test_evaluate_strict_heuristic() {
        let request = serde_json::json!({
            "selected": {"WINGS": -1},
            "algo": "heuristic",
            "mode": "strict",
            "opts": {"wantInfoGain": false}
        });
        let response = create_test_app()
            .oneshot(post_json("/api/evaluate", request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = json_response(response).await;
        assert_eq!(body["mode"], "strict");
        assert_eq!(body["algo"], "heuristic");
        assert!(body["suggestions"].as_array().unwrap().is_empty());

        let excluded: Vec<&str> = body["scores"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|s| s["excluded"] == true)
            .filter_map(|s| s["taxonId"].as_str())
            .collect();
        assert_eq!(excluded, vec!["T1", "T3", "T4", "T5"]);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_malformed_json() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/evaluate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"selected\": [1, 2"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = json_response(response).await;
        assert!(body["error"].is_string());
    }

    // =========================================================================
    // Section 3: Justify
    // =========================================================================

    #[tokio::test]
    async fn test_justify_taxon() {
        let request = serde_json::json!({
            "taxonId": "T4",
            "selected": {"WINGS": 1},
            "selectedMulti": {"HABITAT": ["forest"]}
        });
        let response = create_test_app()
            .oneshot(post_json("/api/justify", request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = json_response(response).await;
        assert_eq!(body["matchCount"], 1);
        assert_eq!(body["conflictCount"], 1);
        assert_eq!(body["conflicts"][0]["traitId"], "HABITAT");
        assert_eq!(body["conflicts"][0]["taxonState"], "wetland");
    }

    #[tokio::test]
    async fn test_justify_unknown_taxon() {
        let request = serde_json::json!({ "taxonId": "NOPE" });
        let response = create_test_app()
            .oneshot(post_json("/api/justify", request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
