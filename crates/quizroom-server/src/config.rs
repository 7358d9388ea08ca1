use std::time::Duration;

use serde::Deserialize;

use quizroom_core::room::MAX_PLAYER_COUNT;

/// Top-level server configuration, loaded from `quizroom.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// JSON file of users and quizzes loaded into the in-memory store at startup.
    pub seed_file: Option<String>,
    pub auth: AuthFileConfig,
    pub rooms: RoomsConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            seed_file: None,
            auth: AuthFileConfig::default(),
            rooms: RoomsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// HMAC key for player tokens. When unset the server generates an
    /// ephemeral key at startup, so tokens do not survive a restart.
    pub token_secret: Option<String>,
}

/// Room pacing and capacity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_player_count: u32,
    /// Wait between a room launching and the `gameStart` broadcast.
    pub launch_settle_ms: u64,
    /// Wait between a question closing and `nextQuestion` / `gameEnd`.
    pub reveal_settle_ms: u64,
    /// Length of one countdown second. Only tests shorten this.
    pub timer_tick_ms: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_player_count: MAX_PLAYER_COUNT,
            launch_settle_ms: 5000,
            reveal_settle_ms: 3000,
            timer_tick_ms: 1000,
        }
    }
}

impl RoomsConfig {
    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn reveal_settle(&self) -> Duration {
        Duration::from_millis(self.reveal_settle_ms)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms)
    }
}

/// Infrastructure limits (connection caps, buffer sizes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_sse_subscribers: usize,
    /// Per-subscriber event queue. A full queue drops events for that subscriber.
    pub subscriber_buffer: usize,
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sse_subscribers: 1000,
            subscriber_buffer: 64,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on values the server cannot run with.
    pub fn validate(&self) {
        if let Err(problem) = self.check() {
            tracing::error!("{problem}");
            std::process::exit(1);
        }
    }

    /// The checks behind [`validate`](Self::validate), without exiting.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {} is not a valid socket address",
                self.listen_addr
            ));
        }
        if let Some(secret) = &self.auth.token_secret
            && secret.len() < 16
        {
            return Err("auth.token_secret must be at least 16 characters".to_string());
        }
        if self.rooms.max_player_count == 0 || self.rooms.max_player_count > MAX_PLAYER_COUNT {
            return Err(format!(
                "rooms.max_player_count must be between 1 and {MAX_PLAYER_COUNT}"
            ));
        }
        if self.rooms.timer_tick_ms == 0 {
            return Err("rooms.timer_tick_ms must be > 0".to_string());
        }
        if self.limits.max_sse_subscribers == 0 {
            return Err("limits.max_sse_subscribers must be > 0".to_string());
        }
        if self.limits.subscriber_buffer == 0 {
            return Err("limits.subscriber_buffer must be > 0".to_string());
        }
        if self.limits.request_timeout_secs == 0 {
            return Err("limits.request_timeout_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Load config from `quizroom.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("quizroom.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from quizroom.toml");
                    if cfg.auth.token_secret.is_some() {
                        tracing::warn!(
                            "token_secret is set in config file, use QUIZROOM_TOKEN_SECRET env var in production"
                        );
                    }
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse quizroom.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No quizroom.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("QUIZROOM_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(secret) = std::env::var("QUIZROOM_TOKEN_SECRET")
            && !secret.is_empty()
        {
            config.auth.token_secret = Some(secret);
        }
        if let Ok(path) = std::env::var("QUIZROOM_SEED_FILE")
            && !path.is_empty()
        {
            config.seed_file = Some(path);
        }
        if let Ok(val) = std::env::var("QUIZROOM_MAX_SSE_SUBSCRIBERS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_sse_subscribers = n;
        }

        config
    }
}
