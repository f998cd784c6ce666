//! Shared fixtures for handler tests: an in-memory app and request builders.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::auth::ACCESS_COOKIE;
use crate::catalog::{Classifier, ClassifierError};
use crate::config::Config;
use crate::db::SqliteRepository;
use crate::server::{build_router, AppState};

/// Classifier that answers with a fixed label, or always fails.
pub struct StubClassifier {
    answer: Option<String>,
    seen: Mutex<Vec<String>>,
}

impl StubClassifier {
    pub fn answering(label: &str) -> Self {
        Self {
            answer: Some(label.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Labels offered on the most recent call.
    pub fn seen_labels(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _text: &str, labels: &[String]) -> Result<String, ClassifierError> {
        *self.seen.lock().unwrap() = labels.to_vec();
        self.answer.clone().ok_or(ClassifierError::EmptyResponse)
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.access_secret = "test-access-secret".to_string();
    config.auth.refresh_secret = "test-refresh-secret".to_string();
    config.auth.bcrypt_cost = 4;
    config.classifier.api_key = "sk-test".to_string();
    config.classifier.prompt_template = "Classify as one of {rankings}: ".to_string();
    config
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(test_config(), StubClassifier::answering("Good")).await
    }

    pub async fn with_config<F: FnOnce(&mut Config)>(f: F) -> Self {
        let mut config = test_config();
        f(&mut config);
        Self::build(config, StubClassifier::answering("Good")).await
    }

    pub async fn with_classifier(classifier: StubClassifier) -> Self {
        Self::build(test_config(), classifier).await
    }

    async fn build(config: Config, classifier: StubClassifier) -> Self {
        let db = SqliteRepository::new("sqlite::memory:", Duration::from_secs(5))
            .await
            .unwrap();
        let state = AppState::new(config, Arc::new(db), Arc::new(classifier));
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    /// Register a user and return the response body.
    pub async fn register(&self, email: &str, password: &str, role: &str) -> Value {
        let (status, _, body) = self
            .send(json_request(
                Method::POST,
                "/register",
                register_body(email, password, role),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    /// Register and log in; returns the user id and the access token.
    pub async fn register_and_login(&self, email: &str, password: &str, role: &str) -> (String, String) {
        let registered = self.register(email, password, role).await;
        let (status, headers, _) = self
            .send(json_request(
                Method::POST,
                "/login",
                json!({"email": email, "password": password}),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let access = cookie_value(&headers, ACCESS_COOKIE).unwrap();
        (registered["user_id"].as_str().unwrap().to_string(), access)
    }
}

pub fn register_body(email: &str, password: &str, role: &str) -> Value {
    json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": email,
        "password": password,
        "role": role,
        "favourite_genres": [{"genre_id": 1, "genre_name": "Comedy"}]
    })
}

pub fn json_request(method: Method, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn cookie_request(method: Method, uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("{}={}", name, value))
        .body(Body::empty())
        .unwrap()
}

/// Value of the named cookie among the response's Set-Cookie headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|c| {
            c.strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or("").to_string())
        })
}
