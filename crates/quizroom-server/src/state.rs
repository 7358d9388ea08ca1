use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::AuthConfig;
use crate::config::ServerConfig;
use crate::room_manager::RoomManager;
use crate::store::RoomStore;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomManager>,
    pub store: Arc<dyn RoomStore>,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
    pub sse_subscriber_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn RoomStore>) -> Self {
        let auth = match &config.auth.token_secret {
            Some(secret) => AuthConfig::new(secret.as_bytes()),
            None => {
                tracing::warn!("No token secret configured, tokens will not survive a restart");
                AuthConfig::ephemeral()
            },
        };
        let rooms = Arc::new(RoomManager::new(
            Arc::clone(&store),
            config.rooms.clone(),
            config.limits.subscriber_buffer,
        ));
        Self {
            rooms,
            store,
            auth,
            config: Arc::new(config),
            sse_subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts one open push connection for as long as it lives.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
