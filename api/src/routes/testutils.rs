use crate::config::Config;
use crate::routes::router;
use crate::state::AppState;
use accounts::email::{Email, EmailError, EmailSender};
use accounts::password::Hasher;
use accounts::{NewAdmin, User};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use docstore::Store;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const USER_PASSWORD: &str = "Sup3r$ecret";
pub const ADMIN_EMAIL: &str = "robin@tablemate.app";
pub const ADMIN_PASSWORD: &str = "Adm1n$ecret";

const CONFIG: &str = r#"
listener:
  host: 127.0.0.1
  port: 3000
frontend_url: https://tablemate.app/
"#;

#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl EmailSender for Outbox {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        self.sent.lock().push(email);
        Ok(())
    }
}

pub struct LoggedIn {
    pub user_id: String,
    pub device_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {token}"))
}

pub fn device_info() -> Value {
    json!({"device_type": "ios", "device_name": "Test phone"})
}

pub struct TestApp {
    pub state: AppState,
    pub outbox: Arc<Outbox>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        let outbox = Arc::new(Outbox::default());
        let state = AppState::new(&Store::new(), &config, outbox.clone())
            .unwrap()
            .with_hasher(Hasher::with_cost(8, 1).unwrap());
        TestApp {
            router: router(state.clone()),
            state,
            outbox,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, path: &str, headers: &[(&str, String)]) -> (StatusCode, Value) {
        self.request(Method::GET, path, headers, None).await
    }

    pub async fn delete(&self, path: &str, headers: &[(&str, String)]) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, headers, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        headers: &[(&str, String)],
        body: Value,
    ) -> (StatusCode, Value) {
        self.request(Method::POST, path, headers, Some(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        headers: &[(&str, String)],
        body: Value,
    ) -> (StatusCode, Value) {
        self.request(Method::PUT, path, headers, Some(body)).await
    }

    pub async fn create_user(&self, email: &str) -> User {
        self.state
            .users
            .create(email, USER_PASSWORD, None)
            .await
            .unwrap()
    }

    pub async fn login_user(&self, email: &str) -> LoggedIn {
        let user = self.create_user(email).await;
        let (status, body) = self
            .post(
                "/v1/auth/login",
                &[],
                json!({"email": email, "password": USER_PASSWORD, "device_info": device_info()}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let field = |name: &str| body["data"][name].as_str().unwrap().to_string();
        LoggedIn {
            user_id: user.id,
            device_id: field("device_id"),
            access_token: field("access_token"),
            refresh_token: field("refresh_token"),
        }
    }

    pub async fn create_admin(&self) {
        self.state
            .admins
            .create(NewAdmin {
                first_name: "Robin".into(),
                last_name: "Doe".into(),
                email: ADMIN_EMAIL.into(),
                password: ADMIN_PASSWORD.into(),
            })
            .await
            .unwrap();
    }

    /// Creates the admin and returns an admin access token.
    pub async fn login_admin(&self) -> String {
        self.create_admin().await;
        let (status, body) = self
            .post(
                "/v1/admin/auth/login",
                &[],
                json!({
                    "email": ADMIN_EMAIL,
                    "password": ADMIN_PASSWORD,
                    "device_info": device_info(),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    /// The token in the most recent password reset link.
    pub fn last_reset_token(&self) -> String {
        let sent = self.outbox.sent.lock();
        let text = &sent.last().unwrap().text;
        let (_, rest) = text.split_once("/reset-password/").unwrap();
        rest.split_whitespace().next().unwrap().to_string()
    }
}
