use std::sync::Arc;
use std::time::Duration;

use quill_api::AppStateInner;
use quill_auth::TokenCodec;
use quill_db::Database;
use quill_domain::Domain;
use quill_domain::mail::{Mailer, RecordingTransport};

pub struct TestServer {
    pub base_url: String,
    pub mail: Arc<RecordingTransport>,
}

/// Spin up the full router on an ephemeral port, backed by an
/// in-memory database and a recording mail transport.
pub async fn spawn_server() -> TestServer {
    let db = Arc::new(Database::open_in_memory().expect("open db"));
    let mail = Arc::new(RecordingTransport::default());
    let mailer = Mailer::start(mail.clone(), 64);
    let domain = Domain::new(
        db,
        TokenCodec::new("integration-test-secret"),
        mailer,
        Some("admin@example.com".into()),
    );
    let state = Arc::new(AppStateInner::new(domain));
    let app = quill_api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestServer {
        base_url: format!("http://{}/api/v1", addr),
        mail,
    }
}

impl TestServer {
    /// Wait for the next mail addressed to `to` and pull the token out
    /// of its body (the token sits alone in the paragraph after the
    /// instruction line).
    pub async fn token_from_mail(&self, to: &str) -> String {
        for _ in 0..50 {
            {
                let sent = self.mail.sent.lock().unwrap();
                if let Some(mail) = sent.iter().rev().find(|m| m.to == to) {
                    let mut paragraphs = mail.body.split("\n\n");
                    paragraphs
                        .find(|p| p.trim_end().ends_with(':'))
                        .expect("instruction paragraph");
                    return paragraphs
                        .next()
                        .expect("token paragraph")
                        .trim()
                        .to_string();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no mail delivered to {}", to);
    }
}

/// Register and confirm an account, returning its user id.
pub async fn register_confirmed(
    server: &TestServer,
    client: &reqwest::Client,
    email: &str,
    username: &str,
    password: &str,
) -> uuid::Uuid {
    let created: serde_json::Value = client
        .post(format!("{}/account/register", server.base_url))
        .json(&serde_json::json!({
            "email": email, "username": username, "password": password
        }))
        .send()
        .await
        .expect("register")
        .error_for_status()
        .expect("register status")
        .json()
        .await
        .expect("register body");
    let user_id: uuid::Uuid = created["user_id"]
        .as_str()
        .expect("user_id")
        .parse()
        .expect("uuid");

    let token = server.token_from_mail(email).await;
    client
        .post(format!("{}/account/confirm", server.base_url))
        .basic_auth(email, Some(password))
        .json(&serde_json::json!({"token": token}))
        .send()
        .await
        .expect("confirm")
        .error_for_status()
        .expect("confirm status");

    user_id
}
