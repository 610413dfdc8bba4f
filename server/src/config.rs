use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Presence chat server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "presence-chat", version, about = "Real-time broadcast chat server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "CHAT_PORT", default_value = "8001")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "CHAT_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./chat.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "CHAT_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// The single origin allowed to open the channel (credentials permitted)
    #[arg(long, env = "CHAT_ALLOWED_ORIGIN", default_value = "http://localhost:5173")]
    pub allowed_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8001,
            bind_address: "0.0.0.0".to_string(),
            config: "./chat.toml".to_string(),
            json_logs: false,
            generate_config: false,
            allowed_origin: "http://localhost:5173".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (CHAT_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        Self::layered(cli)
    }

    fn layered(cli: Config) -> Result<Self, figment::Error> {
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("CHAT_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// Socket address string to bind, e.g. "0.0.0.0:8001".
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Presence Chat Server Configuration
# Place this file at ./chat.toml or specify with --config <path>
# All settings can be overridden via environment variables (CHAT_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8001)
# port = 8001

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# The only origin allowed to connect. Credentialed requests are permitted.
# allowed_origin = "http://localhost:5173"
"#
    .to_string()
}
