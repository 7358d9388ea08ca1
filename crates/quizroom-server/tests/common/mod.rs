use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use quizroom_core::events::RoomEvent;
use quizroom_core::player::{User, UserId};
use quizroom_core::quiz::Quiz;
use quizroom_core::test_helpers::{make_quiz, make_user};

use quizroom_server::auth::AuthConfig;
use quizroom_server::build_app;
use quizroom_server::config::{AuthFileConfig, RoomsConfig, ServerConfig};
use quizroom_server::store::{InMemoryStore, RoomStore, SeedData};

pub const SECRET: &str = "integration-test-secret";

/// Two-question public quiz.
pub const QUIZ_SHORT: u64 = 1;
/// Private quiz; rooms cannot be opened on it.
pub const QUIZ_PRIVATE: u64 = 2;
/// Four-question public quiz.
pub const QUIZ_LONG: u64 = 3;

pub fn alice() -> User {
    make_user(1, "alice")
}
pub fn bob() -> User {
    make_user(2, "bob")
}
pub fn carol() -> User {
    make_user(3, "carol")
}
pub fn dave() -> User {
    make_user(4, "dave")
}

fn seed() -> SeedData {
    SeedData {
        users: vec![alice(), bob(), carol(), dave()],
        quizzes: vec![
            make_quiz(QUIZ_SHORT, 2),
            Quiz {
                public: false,
                ..make_quiz(QUIZ_PRIVATE, 2)
            },
            make_quiz(QUIZ_LONG, 4),
        ],
    }
}

/// Config with a known secret and settle delays and ticks short enough for
/// tests on the real clock.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        auth: AuthFileConfig {
            token_secret: Some(SECRET.to_string()),
        },
        rooms: RoomsConfig {
            launch_settle_ms: 100,
            reveal_settle_ms: 250,
            timer_tick_ms: 50,
            ..RoomsConfig::default()
        },
        ..ServerConfig::default()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    client: reqwest::Client,
    auth: AuthConfig,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let store: Arc<dyn RoomStore> = Arc::new(InMemoryStore::with_seed(seed()));
        let (app, _state) = build_app(config, store);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            client: reqwest::Client::new(),
            auth: AuthConfig::new(SECRET.as_bytes()),
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url())
    }

    pub fn token(&self, user_id: UserId) -> String {
        self.auth.issue_token(user_id)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post(&self, user: &User, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(self.token(user.id))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Create a room and return its id, asserting 201.
    pub async fn create_room(&self, creator: &User, quiz_id: u64, settings: Value) -> String {
        let resp = self
            .post(creator, &format!("/quiz/{quiz_id}/room"), settings)
            .await;
        assert_eq!(resp.status(), 201, "create room failed");
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Open the room's event stream as `user`, asserting 200.
    pub async fn join(&self, user: &User, room_id: &str) -> SseClient {
        let resp = self.join_raw(user, room_id).await;
        assert_eq!(resp.status(), 200, "join failed for {}", user.user_name);
        SseClient::new(resp)
    }

    /// Open the event stream with the token in the query string.
    pub async fn join_raw(&self, user: &User, room_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/room/{room_id}/join")))
            .query(&[("token", self.token(user.id))])
            .send()
            .await
            .unwrap()
    }

    pub async fn answer(&self, user: &User, room_id: &str, answer: &str) -> reqwest::Response {
        self.post(
            user,
            &format!("/room/{room_id}/answer"),
            serde_json::json!({ "answer": answer }),
        )
        .await
    }

    pub async fn join_team(&self, user: &User, room_id: &str, team: &str) -> reqwest::Response {
        self.post(
            user,
            &format!("/room/{room_id}/team"),
            serde_json::json!({ "teamName": team }),
        )
        .await
    }

    pub async fn start(&self, user: &User, room_id: &str) -> reqwest::Response {
        self.post(user, &format!("/room/{room_id}/start"), Value::Null)
            .await
    }
}

/// Reads `event:`/`data:` blocks off an SSE response. Comment-only blocks
/// (keep-alives) are skipped.
pub struct SseClient {
    response: reqwest::Response,
    buffer: String,
}

impl SseClient {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    fn take_block(&mut self) -> Option<RoomEvent> {
        loop {
            let end = self.buffer.find("\n\n")?;
            let block: String = self.buffer.drain(..end + 2).collect();

            let mut name = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim_start().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push_str(v.trim_start());
                }
            }
            if data.is_empty() {
                continue;
            }
            let event: RoomEvent = serde_json::from_str(&data)
                .unwrap_or_else(|e| panic!("bad event payload {data}: {e}"));
            assert_eq!(name.as_deref(), Some(event.event_type()));
            return Some(event);
        }
    }

    /// The next event, or `None` if nothing arrives within `timeout`.
    pub async fn try_next(&mut self, timeout: Duration) -> Option<RoomEvent> {
        tokio::time::timeout(timeout, async {
            loop {
                if let Some(event) = self.take_block() {
                    return Some(event);
                }
                match self.response.chunk().await {
                    Ok(Some(bytes)) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                    _ => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    /// The next event (5s timeout).
    pub async fn next(&mut self) -> RoomEvent {
        self.try_next(Duration::from_secs(5))
            .await
            .expect("Timed out waiting for SSE event")
    }

    /// Skip ahead to the next event named `event_type`, returning it along
    /// with everything skipped.
    pub async fn next_of(&mut self, event_type: &str) -> (RoomEvent, Vec<RoomEvent>) {
        let mut skipped = Vec::new();
        loop {
            let event = self.next().await;
            if event.event_type() == event_type {
                return (event, skipped);
            }
            skipped.push(event);
        }
    }
}
