#[cfg(test)]
mod tests {
    use super::super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Local, NaiveTime};
    use signal_core::{Market, RawSourceRecord, SnapshotInputs, SnapshotKey, UniverseEntry};
    use snapshot_store::MemorySnapshotStore;
    use tower::ServiceExt;

    type Row<'a> = (&'a str, Market, Option<&'a str>, Option<&'a str>);

    fn inputs(rows: &[Row]) -> SnapshotInputs {
        let mut inputs = SnapshotInputs::default();
        for (code, market, vision, api) in rows {
            inputs.universe.push(UniverseEntry {
                code: code.to_string(),
                name: format!("종목{code}"),
                market: *market,
                rank: None,
            });
            if let Some(signal) = vision {
                inputs.vision.push(RawSourceRecord::new(*code, *signal));
            }
            if let Some(signal) = api {
                inputs.api.push(RawSourceRecord::new(*code, *signal));
            }
        }
        inputs
    }

    fn latest_inputs() -> SnapshotInputs {
        inputs(&[
            ("K1", Market::Kospi, Some("매수"), Some("매수")),
            ("K2", Market::Kospi, Some("매수"), Some("적극매도")),
            ("Q1", Market::Kosdaq, Some("매수"), None),
        ])
    }

    fn app(store: Arc<MemorySnapshotStore>) -> Router {
        build_router(AppState::new(store, ServerConfig::default()))
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(app, method, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::new(MemorySnapshotStore::new()));
        let (status, body) = send_json(&app, "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_filtered_signals() {
        let store = MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, latest_inputs());
        let app = app(Arc::new(store));

        let (status, body) = send_json(&app, "GET", "/api/signals?market=KOSPI&status=mismatch").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let data = &body["data"];
        let codes: Vec<&str> = data["filtered"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["code"].as_str().unwrap())
            .collect();
        assert_eq!(codes, vec!["K2"]);
        assert_eq!(data["snapshot"], "latest");
        assert_eq!(data["stats"]["total"], 1);
        assert_eq!(data["overall"]["total"], 3);
        // Market facet ignores the market selection itself
        assert_eq!(data["facets"]["market"]["all"], 1);
        assert_eq!(data["facets"]["market"]["KOSDAQ"], 0);
    }

    #[tokio::test]
    async fn test_bad_filter_is_400() {
        let store = MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, latest_inputs());
        let app = app(Arc::new(store));

        let (status, body) = send_json(&app, "GET", "/api/signals?status=maybe").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("maybe"));

        let (status, _) = send_json(&app, "GET", "/api/signals?snapshot=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_404() {
        let store = MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, latest_inputs());
        let app = app(Arc::new(store));

        let (status, body) = send_json(&app, "GET", "/api/signals?snapshot=2024-12-31T15:30").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_markdown_report() {
        let store = MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, latest_inputs());
        let app = app(Arc::new(store));

        let request = Request::builder()
            .uri("/api/signals/report?market=KOSPI")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[axum::http::header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/markdown"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report = String::from_utf8(body.to_vec()).unwrap();
        assert!(report.starts_with("# 시그널 비교 리포트"));
        assert!(report.contains("K2"));
        assert!(!report.contains("Q1"));
    }

    #[tokio::test]
    async fn test_refresh_invalidates_latest() {
        let store = Arc::new(MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, latest_inputs()));
        let app = app(Arc::clone(&store));

        let (_, before) = send_json(&app, "GET", "/api/signals").await;
        assert_eq!(before["data"]["stats"]["total"], 3);

        store
            .insert(
                SnapshotKey::Latest,
                inputs(&[("K9", Market::Kospi, Some("중립"), Some("중립"))]),
            )
            .unwrap();

        let (_, cached) = send_json(&app, "GET", "/api/signals").await;
        assert_eq!(cached["data"]["stats"]["total"], 3);

        let (status, refreshed) = send_json(&app, "POST", "/api/snapshots/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refreshed["data"]["generation"], 1);

        let (_, after) = send_json(&app, "GET", "/api/signals").await;
        assert_eq!(after["data"]["stats"]["total"], 1);
        assert_eq!(after["data"]["filtered"][0]["code"], "K9");
    }

    #[tokio::test]
    async fn test_list_history_and_prune() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let recent = SnapshotKey::historical(Local::now().date_naive(), nine);
        let ancient: SnapshotKey = "2000-01-01 09:00".parse().unwrap();

        let store = MemorySnapshotStore::new()
            .with_snapshot(SnapshotKey::Latest, latest_inputs())
            .with_snapshot(recent, latest_inputs())
            .with_snapshot(ancient, latest_inputs());
        let app = app(Arc::new(store));

        let (_, listed) = send_json(&app, "GET", "/api/snapshots").await;
        assert_eq!(
            listed["data"],
            serde_json::json!(["latest", recent.to_string(), "2000-01-01 09:00"])
        );

        let (_, history) = send_json(&app, "GET", "/api/snapshots/history").await;
        let history = history["data"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["key"], recent.to_string());
        assert_eq!(history[0]["total_stocks"], 3);

        let (status, _) = send_json(&app, "POST", "/api/snapshots/prune?days=-5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, pruned) = send_json(&app, "POST", "/api/snapshots/prune?days=30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pruned["data"]["removed"], serde_json::json!(["2000-01-01 09:00"]));

        let (_, listed) = send_json(&app, "GET", "/api/snapshots").await;
        assert_eq!(listed["data"], serde_json::json!(["latest", recent.to_string()]));

        let (status, _) = send_json(&app, "GET", "/api/signals?snapshot=2000-01-01T09:00").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_archive_latest() {
        let store = MemorySnapshotStore::new().with_snapshot(SnapshotKey::Latest, latest_inputs());
        let app = app(Arc::new(store));

        let (status, body) = send_json(&app, "POST", "/api/snapshots/archive?at=2025-01-15T15:30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["key"], "2025-01-15 15:30");

        let (status, _) = send_json(&app, "POST", "/api/snapshots/archive?at=2025-01-15T15:30").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send_json(&app, "POST", "/api/snapshots/archive?at=latest").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(&app, "GET", "/api/signals?snapshot=2025-01-15T15:30").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["overall"]["total"], 3);
    }
}
