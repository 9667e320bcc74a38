use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::{
    config::config_model::Sweep,
    usecases::expire_pending_checkouts::{
        ExpirePendingCheckoutsParams, ExpirePendingCheckoutsUseCase,
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/sweeps/pending-checkouts" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"older_than_minutes":30,"limit":100,"dry_run":true}'

#[derive(Clone)]
pub struct SweepRouteState {
    sweep: Sweep,
    usecase: Arc<ExpirePendingCheckoutsUseCase>,
}

pub fn routes(sweep: Sweep, usecase: Arc<ExpirePendingCheckoutsUseCase>) -> Router {
    Router::new()
        .route("/pending-checkouts", post(sweep_pending_checkouts))
        .with_state(SweepRouteState { sweep, usecase })
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepPendingCheckoutsRequest {
    pub older_than_minutes: Option<i64>,
    pub limit: Option<i64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SweepPendingCheckoutsResponse {
    pub scanned: usize,
    pub abandoned: usize,
    pub already_resolved: usize,
    pub failed: usize,
    pub cancelled_orphans: usize,
    pub expired_subscriptions: usize,
    pub dry_run: bool,
    pub candidate_ids: Vec<Uuid>,
    pub abandoned_ids: Vec<Uuid>,
}

pub async fn sweep_pending_checkouts(
    State(state): State<SweepRouteState>,
    headers: HeaderMap,
    Json(payload): Json<SweepPendingCheckoutsRequest>,
) -> Response {
    let Some(expected_token) = state.sweep.internal_token.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "sweep token is not configured",
        )
            .into_response();
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let params = ExpirePendingCheckoutsParams {
        older_than_minutes: payload
            .older_than_minutes
            .unwrap_or(state.sweep.pending_ttl_minutes),
        limit: payload.limit.or(state.sweep.batch_limit),
        dry_run: payload.dry_run.unwrap_or(false),
    };
    let dry_run = params.dry_run;

    match state.usecase.run(params).await {
        Ok(result) => Json(SweepPendingCheckoutsResponse {
            scanned: result.scanned,
            abandoned: result.abandoned,
            already_resolved: result.already_resolved,
            failed: result.failed,
            cancelled_orphans: result.cancelled_orphans,
            expired_subscriptions: result.expired_subscriptions,
            dry_run,
            candidate_ids: result.candidate_ids,
            abandoned_ids: result.abandoned_ids,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "sweeps: pending checkout sweep failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header::CONTENT_TYPE},
    };
    use crates::domain::repositories::checkout_sweep::MockCheckoutSweepRepository;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const TOKEN: &str = "sweep-token";

    fn sweep(internal_token: Option<&str>) -> Sweep {
        Sweep {
            pending_ttl_minutes: 30,
            interval_seconds: 300,
            batch_limit: None,
            internal_token: internal_token.map(str::to_string),
        }
    }

    fn request(authorization: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/pending-checkouts")
            .header(CONTENT_TYPE, "application/json");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn app(sweep: Sweep, repo: MockCheckoutSweepRepository) -> Router {
        routes(sweep, Arc::new(ExpirePendingCheckoutsUseCase::new(Arc::new(repo))))
    }

    #[tokio::test]
    async fn rejects_wrong_token() {
        let response = app(sweep(Some(TOKEN)), MockCheckoutSweepRepository::new())
            .oneshot(request(Some("Bearer nope"), json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unconfigured_token_disables_the_route() {
        let response = app(sweep(None), MockCheckoutSweepRepository::new())
            .oneshot(request(Some("Bearer anything"), json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn dry_run_reports_counts() {
        let mut repo = MockCheckoutSweepRepository::new();
        repo.expect_list_stale_pending_payments()
            .withf(|_, limit| *limit == Some(5))
            .returning(|_, _| Ok(vec![]));
        repo.expect_abandon_pending_checkout().never();
        repo.expect_cancel_orphaned_subscriptions().never();
        repo.expect_expire_lapsed_subscriptions().never();

        let response = app(sweep(Some(TOKEN)), repo)
            .oneshot(request(
                Some("Bearer sweep-token"),
                json!({ "limit": 5, "dry_run": true }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["scanned"], 0);
    }
}
