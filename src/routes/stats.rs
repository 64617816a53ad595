//! Monitoring export of the retention stats registry.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, retention::RetentionSnapshot};

/// Body of `GET /debug/vars`, one entry per published stats group.
#[derive(Debug, Serialize)]
pub struct DebugVars {
    pub retention: RetentionSnapshot,
}

#[tracing::instrument(name = "stats.debug_vars", skip(state))]
pub async fn debug_vars(State(state): State<AppState>) -> Json<DebugVars> {
    Json(DebugVars {
        retention: state.stats.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use chrono::Utc;
    use http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::routes::tests::{get_json, test_app};

    #[tokio::test]
    async fn test_debug_vars_before_first_scan() {
        let (app, _stats) = test_app("[datastore]\nretention_minutes = 60\n");

        let (status, json) = get_json(&app, "/debug/vars").await;
        assert_eq!(status, StatusCode::OK);

        let retention = &json["retention"];
        assert_eq!(retention["DeletesTotal"], 0);
        assert_eq!(retention["DeletesHist"], "");
        assert_eq!(retention["Period"], 3600);
        assert_eq!(retention["State"], "idle");
        // Never completed reads as time since the Unix epoch
        assert!(retention["SecondsSinceScanCompleted"].as_i64().unwrap() > 1_000_000_000);
    }

    #[tokio::test]
    async fn test_debug_vars_reflects_registry() {
        let (app, stats) = test_app("[datastore]\nretention_minutes = 1440\n");
        stats.record_completion(Utc::now() - chrono::Duration::seconds(30));
        stats.increment_deletes();
        stats.increment_deletes();

        let (_, json) = get_json(&app, "/debug/vars").await;
        let retention = &json["retention"];
        assert_eq!(retention["DeletesTotal"], 2);
        assert_eq!(retention["Period"], 86400);
        let since = retention["SecondsSinceScanCompleted"].as_i64().unwrap();
        assert!((30..35).contains(&since), "since = {since}");
    }

    #[tokio::test]
    async fn test_debug_vars_disabled() {
        let (app, _stats) = test_app("");

        let request = Request::builder()
            .uri("/debug/vars")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["retention"]["Period"], 0);
        assert_eq!(json["retention"]["State"], "disabled");
    }
}
