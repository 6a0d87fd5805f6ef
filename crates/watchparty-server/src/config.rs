use serde::Deserialize;

/// Top-level server configuration, loaded from `watchparty.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub cors: CorsConfig,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            cors: CorsConfig::default(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Browser origins allowed to reach the HTTP surface. Empty means any
/// origin, which is fine for development but should be narrowed to the
/// deployed frontend domains in production.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Outbound frames buffered per connection before drops kick in.
    pub client_message_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            client_message_buffer: 256,
            ws_rate_limit_per_sec: 20.0,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// How long an empty room survives before deletion. Long enough to
    /// ride out a transient disconnect/reconnect of every participant.
    pub empty_room_ttl_ms: u64,
    /// Whether a connection holding the room's secret may reclaim host.
    pub host_claim_enabled: bool,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            empty_room_ttl_ms: 10 * 60 * 1000,
            host_claim_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on values the server cannot run with.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.client_message_buffer == 0 {
            tracing::error!("limits.client_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.rooms.empty_room_ttl_ms == 0 {
            tracing::error!("rooms.empty_room_ttl_ms must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `watchparty.toml` if it exists, then apply env
    /// var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("watchparty.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from watchparty.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse watchparty.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No watchparty.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("WATCHPARTY_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(origins) = std::env::var("WATCHPARTY_CORS_ORIGINS") {
            config.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(val) = std::env::var("WATCHPARTY_EMPTY_ROOM_TTL_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.empty_room_ttl_ms = n;
        }
        if let Ok(val) = std::env::var("WATCHPARTY_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("WATCHPARTY_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }

        config
    }
}
