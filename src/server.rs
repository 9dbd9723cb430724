/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{PostError, PostResult},
    metrics,
    rate_limit::rate_limit_middleware,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let body_limit = ctx.config.limits.max_body_bytes();

    Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(crate::api::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(metrics::track_http_metrics))
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Prometheus text exposition
async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> PostResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Post service listening on {}", addr);
    info!("   Public URL: {}", ctx.config.service.public_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PostError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| PostError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::issue_test_token,
        blob_store::{testing::RecordingBackend, BlobStore},
        config::ServerConfig,
        db,
    };
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        response::Response,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "post-test-boundary";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn form_request(method: Method, uri: &str, token: Option<&str>, parts: &[Part]) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(multipart_body(parts))).unwrap()
    }

    fn plain_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    struct TestApp {
        router: Router,
        backend: RecordingBackend,
        secret: String,
    }

    impl TestApp {
        async fn with_config(config: ServerConfig) -> Self {
            let pool = db::memory_pool().await;
            let backend = RecordingBackend::new();
            let blobs = BlobStore::new(
                Arc::new(backend.clone()),
                pool.clone(),
                &config.service.public_url,
            );
            let secret = config.authentication.jwt_secret.clone();
            let ctx = AppContext::assemble(config, pool, blobs);

            Self {
                router: build_router(ctx),
                backend,
                secret,
            }
        }

        async fn new() -> Self {
            Self::with_config(ServerConfig::for_tests()).await
        }

        fn token(&self, user_id: &str) -> String {
            issue_test_token(user_id, &self.secret, 3600)
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;

        let response = app.send(plain_request(Method::GET, "/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = TestApp::new().await;

        let response = app.send(plain_request(Method::GET, "/nowhere", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_session() {
        let app = TestApp::new().await;

        let parts = [
            Part::Text("text", "Hello there"),
            Part::Text("visibility", "public"),
        ];
        let response = app
            .send(form_request(Method::POST, "/posts", None, &parts))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["message"], crate::error::SIGN_IN_MESSAGE);
        assert!(app.backend.puts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_submission_is_rejected_with_detail() {
        let app = TestApp::new().await;
        let token = app.token("alice");

        let parts = [
            Part::Text("text", "Hello there"),
            Part::Text("visibility", "everyone"),
            Part::File("image", "cat.png", PNG),
        ];
        let response = app
            .send(form_request(Method::POST, "/posts", Some(&token), &parts))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            "visibility: Please select a valid visibility option."
        );
        assert!(app.backend.puts().is_empty());
    }

    #[tokio::test]
    async fn test_post_lifecycle() {
        let app = TestApp::new().await;
        let token = app.token("alice");

        // Create with one uploaded image
        let parts = [
            Part::Text("text", "Hello there"),
            Part::Text("visibility", "public"),
            Part::File("image", "cat.png", PNG),
            Part::Text("ignored", "whatever"),
        ];
        let response = app
            .send(form_request(Method::POST, "/posts", Some(&token), &parts))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        // Read it back anonymously
        let response = app
            .send(plain_request(Method::GET, &format!("/posts/{}", id), None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let post = json_body(response).await;
        assert_eq!(post["ownerId"], "alice");
        let image_url = post["images"][0].as_str().unwrap().to_string();
        assert!(image_url.starts_with("http://localhost:3000/blob/"));

        // The uploaded bytes are served back
        let blob_path = image_url.trim_start_matches("http://localhost:3000");
        let response = app.send(plain_request(Method::GET, blob_path, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], PNG);

        // Replace the image and make the post private
        let parts = [
            Part::Text("text", "Edited text"),
            Part::Text("visibility", "private"),
            Part::File("image", "dog.png", PNG),
        ];
        let response = app
            .send(form_request(
                Method::PUT,
                &format!("/posts/{}", id),
                Some(&token),
                &parts,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.backend.deletes().len(), 1);

        // Hidden from everyone but the owner
        let response = app
            .send(plain_request(Method::GET, &format!("/posts/{}", id), None))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app
            .send(plain_request(Method::GET, &format!("/posts/{}", id), Some(&token)))
            .await;
        assert_eq!(json_body(response).await["text"], "Edited text");

        // Delete, then delete again
        let response = app
            .send(plain_request(Method::DELETE, &format!("/posts/{}", id), Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.backend.deletes().len(), 2);

        let response = app
            .send(plain_request(Method::DELETE, &format!("/posts/{}", id), Some(&token)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.backend.deletes().len(), 2);
    }

    #[tokio::test]
    async fn test_non_form_body_gets_json_error() {
        let app = TestApp::new().await;
        let token = app.token("alice");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/posts")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(r#"{"text":"Hello there"}"#))
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "InvalidRequest");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Expected multipart form data"));
    }

    #[tokio::test]
    async fn test_rate_limited_response_has_retry_after() {
        let mut config = ServerConfig::for_tests();
        config.rate_limit.unauthenticated_rps = 1;
        let app = TestApp::with_config(config).await;

        let first = app.send(plain_request(Method::GET, "/health", None)).await;
        assert_eq!(first.status(), StatusCode::OK);

        let response = app.send(plain_request(Method::GET, "/health", None)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(json_body(response).await["error"], "RateLimitExceeded");
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent_is_opaque_failure() {
        let app = TestApp::new().await;
        let token = app.token("bob");

        let parts = [
            Part::Text("text", "Nice post!"),
            Part::Text("visibility", "public"),
        ];
        let response = app
            .send(form_request(
                Method::POST,
                "/posts/no-such-post/replies",
                Some(&token),
                &parts,
            ))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["message"],
            crate::error::GENERIC_FAILURE_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_update_by_another_user_is_not_found() {
        let app = TestApp::new().await;
        let alice = app.token("alice");
        let mallory = app.token("mallory");

        let parts = [
            Part::Text("text", "Hello there"),
            Part::Text("visibility", "public"),
        ];
        let response = app
            .send(form_request(Method::POST, "/posts", Some(&alice), &parts))
            .await;
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .send(form_request(
                Method::PUT,
                &format!("/posts/{}", id),
                Some(&mallory),
                &parts,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = TestApp::new().await;
        app.send(plain_request(Method::GET, "/health", None)).await;

        let response = app.send(plain_request(Method::GET, "/metrics", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("http_requests_total"));
    }
}
