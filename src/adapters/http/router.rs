//! Top-level HTTP router: webhook, health check and shared middleware.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::health::healthcheck;
use super::webhook::{webhook_router, WebhookAppState};

/// Middleware limits for the public listener.
#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// Builds the full application router.
///
/// # Routes
/// - `POST /webhook` - subscription provider push
/// - `GET /healthcheck` - liveness
pub fn app_router(state: WebhookAppState, settings: HttpSettings) -> Router {
    let router = Router::new()
        .merge(webhook_router())
        .route("/healthcheck", get(healthcheck))
        .with_state(state);
    with_middleware(router, settings)
}

/// Router for deployments without the subscription webhook: only `GET /healthcheck`.
pub fn health_router(settings: HttpSettings) -> Router {
    with_middleware(Router::new().route("/healthcheck", get(healthcheck)), settings)
}

fn with_middleware(router: Router, settings: HttpSettings) -> Router {
    router
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(TimeoutLayer::new(settings.request_timeout))
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use crate::adapters::memory::InMemoryProcessedWebhookStore;
    use crate::application::testing::Fixture;
    use crate::domain::webhook::SignatureVerifier;

    fn app() -> Router {
        let fx = Fixture::new();
        let state = WebhookAppState {
            verifier: SignatureVerifier::new(SecretString::new("s".to_string())),
            customers: fx.customers.clone(),
            processed: Arc::new(InMemoryProcessedWebhookStore::new()),
            orchestrator: fx.orchestrator.clone(),
        };
        app_router(state, HttpSettings::default())
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let response = app()
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_rejects_get() {
        let response = app()
            .oneshot(Request::get("/webhook").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let fx = Fixture::new();
        let state = WebhookAppState {
            verifier: SignatureVerifier::new(SecretString::new("s".to_string())),
            customers: fx.customers.clone(),
            processed: Arc::new(InMemoryProcessedWebhookStore::new()),
            orchestrator: fx.orchestrator.clone(),
        };
        let settings = HttpSettings {
            body_limit_bytes: 16,
            ..HttpSettings::default()
        };
        let response = app_router(state, settings)
            .oneshot(
                Request::post("/webhook")
                    .header("content-length", "64")
                    .body(Body::from(vec![b'x'; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn health_router_has_no_webhook_route() {
        let router = health_router(HttpSettings::default());

        let response = router
            .clone()
            .oneshot(Request::post("/webhook").body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
