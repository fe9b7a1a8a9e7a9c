use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/landing", get(handlers::landing))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/history", get(handlers::history))
        .route("/api/classify", post(handlers::classify))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::auth::{CurrentUser, PasswordHasher, SessionStore};
    pub use crate::{create_app, ApiError, AppState};
    pub use fnl_core::{Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, Utc};
    use fnl_core::{ArticleRecord, ArticleStore, ExtractionMetadata, InputType, Label};
    use fnl_inference::models::DummyModel;
    use fnl_inference::ClassifierService;
    use fnl_scrappers::GenericScraper;
    use fnl_storage::Stores;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::PasswordHasher;

    const FORM: &str = "application/x-www-form-urlencoded";

    struct TestApp {
        router: Router,
        articles: Arc<dyn ArticleStore>,
    }

    fn test_app(model: DummyModel) -> TestApp {
        let stores = Stores::memory();
        let articles = stores.articles.clone();
        let classifier = Arc::new(ClassifierService::with_backend(Arc::new(model)));
        let scraper = Arc::new(GenericScraper::new().unwrap());
        let state = AppState::new(stores, classifier, scraper, "test-secret")
            .with_password_hasher(PasswordHasher::with_iterations(1_000));
        TestApp {
            router: create_app(state),
            articles,
        }
    }

    fn form_request(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, FORM);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    /// Registers `email` and returns (token, user id).
    async fn register(app: &TestApp, email: &str) -> (String, String) {
        let (status, body) = send(
            app,
            form_request("/api/register", &format!("email={}&password=secret1", email), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    fn record(user_id: &str, label: Label, url: Option<&str>, minutes_ago: i64) -> ArticleRecord {
        ArticleRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            input_type: if url.is_some() { InputType::Url } else { InputType::Text },
            raw_input: url.unwrap_or("pasted").to_string(),
            article_text: "Some article text".to_string(),
            model_label: label,
            model_score: 0.9,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            meta: ExtractionMetadata {
                url: url.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(DummyModel::new());
        let response = app.router.clone().oneshot(get_request("/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let app = test_app(DummyModel::new());
        let (status, body) = send(
            &app,
            form_request("/api/register", "email=Reader%40Example.com&password=secret1", None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "reader@example.com");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = send(
            &app,
            form_request("/api/login", "email=READER%40example.com&password=secret1", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().unwrap().contains('.'));

        let (status, body) = send(
            &app,
            form_request("/api/login", "email=reader%40example.com&password=wrong-one", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials.");

        let (status, _) = send(
            &app,
            form_request("/api/login", "email=nobody%40example.com&password=secret1", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = test_app(DummyModel::new());
        for body in ["email=a%40b.com", "password=secret1", "email=a%40b.com&password=12345"] {
            let (status, json) = send(&app, form_request("/api/register", body, None)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
            assert_eq!(json["kind"], "validation");
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let app = test_app(DummyModel::new());
        register(&app, "dup%40example.com").await;

        let (status, body) = send(
            &app,
            form_request("/api/register", "email=DUP%40example.com&password=another1", None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered. Please log in.");
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let app = test_app(DummyModel::new());
        for uri in ["/api/dashboard", "/api/history"] {
            let (status, _) = send(&app, get_request(uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            let (status, _) = send(&app, get_request(uri, Some("forged.deadbeef"))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, _) = send(&app, form_request("/api/classify", "article_text=hello", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_cookie_and_logout() {
        let app = test_app(DummyModel::new());
        let (token, _) = register(&app, "cookie%40example.com").await;

        let request = Request::builder()
            .uri("/api/history")
            .header(header::COOKIE, format!("fnl_session={}", token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, form_request("/api/logout", "", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, get_request("/api/history", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_classify_text() {
        let app = test_app(DummyModel::fixed("REAL", 0.87));
        let (token, user_id) = register(&app, "reader%40example.com").await;

        let (status, body) = send(
            &app,
            form_request(
                "/api/classify",
                "input_type=text&article_text=This+is+breaking+news+about+the+economy.",
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Analysis complete.");
        assert_eq!(body["result"]["label"], "Real");
        assert_eq!(body["result"]["score"], 0.87);
        assert_eq!(body["record"]["input_type"], "text");
        assert!(body["record"]["meta"]["url"].is_null());

        let history = app.articles.recent_for_user(&user_id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].article_text, "This is breaking news about the economy.");
    }

    #[tokio::test]
    async fn test_classify_errors_echo_submission() {
        let app = test_app(DummyModel::new());
        let (token, _) = register(&app, "reader%40example.com").await;

        let (status, body) = send(
            &app,
            form_request("/api/classify", "input_type=url&article_url=++", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Provide a URL to analyze.");

        let (status, body) = send(
            &app,
            form_request("/api/classify", "input_type=text&article_text=", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("No text found."));

        let (status, body) = send(
            &app,
            form_request("/api/classify", "input_type=pdf&article_text=abc", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["article_text"], "abc");
    }

    #[tokio::test]
    async fn test_classify_unreachable_url() {
        let app = test_app(DummyModel::new());
        let (token, _) = register(&app, "reader%40example.com").await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{}/story", addr);

        let (status, body) = send(
            &app,
            form_request(
                "/api/classify",
                &format!("input_type=url&article_url={}", url),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "fetch");
        assert!(body["error"].as_str().unwrap().contains("HTTP error"));
        assert_eq!(body["article_url"], url.as_str());
        assert_eq!(body["meta"]["url"], url.as_str());
        assert_eq!(app.articles.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_classify_model_failure() {
        let app = test_app(DummyModel::failing("weights missing"));
        let (token, _) = register(&app, "reader%40example.com").await;

        let (status, body) = send(
            &app,
            form_request("/api/classify", "article_text=Some+article+text", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "model");
        assert!(body["error"].as_str().unwrap().starts_with("Model error: "));
    }

    #[tokio::test]
    async fn test_dashboard_and_history() {
        let app = test_app(DummyModel::new());
        let (token, user_id) = register(&app, "reader%40example.com").await;
        let (_, other_id) = register(&app, "other%40example.com").await;

        for (label, minutes_ago) in [(Label::Fake, 30), (Label::Fake, 20), (Label::Real, 10)] {
            app.articles.insert_article(&record(&user_id, label, None, minutes_ago)).await.unwrap();
        }
        app.articles.insert_article(&record(&other_id, Label::Real, None, 5)).await.unwrap();

        let (status, body) = send(&app, get_request("/api/dashboard", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count_user"], 3);
        assert_eq!(body["count_all"], 4);
        assert_eq!(body["fake_share"], 66.7);
        assert_eq!(body["label_counts"]["Fake"], 2);
        assert_eq!(body["last_record"]["model_label"], "Real");

        let (status, body) = send(&app, get_request("/api/history", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        let labels: Vec<&str> = body["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["model_label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["Real", "Fake", "Fake"]);
    }

    #[tokio::test]
    async fn test_landing_top_sources() {
        let app = test_app(DummyModel::new());
        let urls = [
            "https://hoax.example/a",
            "https://hoax.example/b",
            "https://rumor.example/a",
            "not a url",
        ];
        for (i, url) in urls.iter().enumerate() {
            app.articles
                .insert_article(&record("u1", Label::Fake, Some(url), i as i64))
                .await
                .unwrap();
        }
        app.articles
            .insert_article(&record("u1", Label::Real, Some("https://wire.example/x"), 0))
            .await
            .unwrap();

        let (status, body) = send(&app, get_request("/api/landing", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["articles"].as_array().unwrap().len(), 5);
        assert_eq!(
            body["top_sources"],
            serde_json::json!([
                { "domain": "hoax.example", "count": 2 },
                { "domain": "rumor.example", "count": 1 }
            ])
        );
    }
}
