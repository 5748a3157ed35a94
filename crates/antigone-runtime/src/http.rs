//! HTTP surface for the policy service.
//!
//! | Method | Path       | Behaviour                                   |
//! |--------|------------|---------------------------------------------|
//! | GET    | `/health`  | readiness, mode, active genome hash         |
//! | POST   | `/check`   | dry-run decision, never blocks              |
//! | POST   | `/act`     | gated decision, `409` when refused          |
//! | GET    | `/metrics` | Prometheus text exposition                  |
//!
//! `/antigone/check` and `/antigone/act` are kept as aliases for older
//! callers. Request bodies are `{"text": ..., "capabilities": [...]}` or a
//! bare string; malformed bodies evaluate as the empty command.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use antigone_core::{Command, Decision};

use crate::service::{ActResult, Health, PolicyService};

/// Content type of the Prometheus text format.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Response body for `/act`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActResponse {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<String>,

    pub decision: Decision,
}

impl From<ActResult> for ActResponse {
    fn from(result: ActResult) -> Self {
        match result {
            ActResult::Blocked { reason, decision } => Self {
                ok: false,
                reason: Some(reason),
                echo: None,
                decision,
            },
            ActResult::Passed { echo, decision } => Self {
                ok: true,
                reason: None,
                echo: Some(echo),
                decision,
            },
        }
    }
}

/// Build the service router.
pub fn router(service: PolicyService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/check", post(check))
        .route("/act", post(act))
        .route("/antigone/check", post(check))
        .route("/antigone/act", post(act))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn health(State(service): State<PolicyService>) -> Json<Health> {
    Json(service.health())
}

async fn check(State(service): State<PolicyService>, body: Bytes) -> Json<Decision> {
    let command = Command::from_body(&body);
    Json(service.check(&command))
}

async fn act(State(service): State<PolicyService>, body: Bytes) -> Response {
    let command = Command::from_body(&body);
    let result = service.act(&command);

    let status = if result.is_blocked() {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    };

    (status, Json(ActResponse::from(result))).into_response()
}

async fn metrics(State(service): State<PolicyService>) -> Response {
    match service.metrics() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", METRICS_CONTENT_TYPE)],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEmitter;
    use crate::config::DecisionMode;
    use antigone_core::{Genome, Stance};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const GENOME: &str = r#"
axioms:
  - id: non_harm
    stance: deny
    weight: 1.0
    match:
      keywords: [harm]
principles:
  - id: transparency
    stance: allow
    weight: 0.6
    match:
      keywords: [audit, trace]
duties:
  - id: reader
    stance: allow
    weight: 1.0
    match:
      keywords: [file]
      require_caps: [read]
"#;

    fn test_router(mode: DecisionMode) -> Router {
        let service =
            PolicyService::new(Genome::from_yaml(GENOME).unwrap(), mode, AuditEmitter::disabled())
                .unwrap();
        router(service)
    }

    async fn post_body(app: &Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_returns_identity() {
        let app = test_router(DecisionMode::Gate);
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["ready"], true);
        assert_eq!(json["mode"], "gate");
        assert_eq!(json["genome_sha256"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn check_returns_decision() {
        let app = test_router(DecisionMode::Gate);
        let (status, json) = post_body(&app, "/check", r#"{"text":"audit and trace logs"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["decision"], "allow");
        assert_eq!(json["score"], serde_json::json!(0.6));
        assert_eq!(json["hits"][0]["id"], "transparency");
        assert_eq!(json["hits"][0]["why"], "kw:audit;kw:trace");
    }

    #[tokio::test]
    async fn check_never_blocks_deny() {
        let app = test_router(DecisionMode::Gate);
        let (status, json) = post_body(&app, "/check", r#"{"text":"please harm the system"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["decision"], "deny");
    }

    #[tokio::test]
    async fn check_accepts_bare_string_and_caps() {
        let app = test_router(DecisionMode::Warn);

        let (_, json) = post_body(&app, "/check", r#""please harm""#).await;
        assert_eq!(json["decision"], "deny");

        let (_, json) = post_body(&app, "/check", r#"{"text":"open file","caps":["read"]}"#).await;
        assert_eq!(json["hits"][0]["id"], "reader");

        let (_, json) = post_body(&app, "/check", r#"{"text":"open file"}"#).await;
        assert_eq!(json["hits"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn malformed_body_is_empty_command() {
        let app = test_router(DecisionMode::Gate);
        let (status, json) = post_body(&app, "/check", "[1, 2, 3]").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["decision"], "warn");
        assert_eq!(json["score"], serde_json::json!(0.0));
    }

    #[tokio::test]
    async fn act_blocks_in_gate_mode() {
        let app = test_router(DecisionMode::Gate);
        let (status, json) = post_body(&app, "/act", r#"{"text":"please harm the system"}"#).await;

        assert_eq!(status, StatusCode::CONFLICT);
        let body: ActResponse = serde_json::from_value(json).unwrap();
        assert!(!body.ok);
        assert_eq!(body.reason.as_deref(), Some("dissonance"));
        assert_eq!(body.decision.decision, Stance::Deny);
        assert_eq!(body.decision.hit_ids(), vec!["non_harm"]);
    }

    #[tokio::test]
    async fn act_passes_in_warn_mode() {
        let app = test_router(DecisionMode::Warn);
        let (status, json) = post_body(&app, "/act", r#"{"text":"please harm the system"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["echo"], "please harm the system");
        assert_eq!(json["decision"]["decision"], "deny");
    }

    #[tokio::test]
    async fn act_alias_path() {
        let app = test_router(DecisionMode::Gate);
        let (status, json) = post_body(&app, "/antigone/act", r#"{"text":"audit"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn metrics_exposition() {
        let app = test_router(DecisionMode::Gate);
        post_body(&app, "/act", r#"{"text":"harm"}"#).await;

        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], METRICS_CONTENT_TYPE);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(r#"antigone_refusals_total{reason="dissonance"} 1"#));
        assert!(text.contains(r#"antigone_decisions_total{decision="deny"} 1"#));
    }
}
