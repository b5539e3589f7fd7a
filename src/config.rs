use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub session_expires_in: i64,  // seconds
    pub referral_expires_in: i64, // seconds, referrer cookie lifetime
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Resend API key. Leave empty in non-production environments to skip
    /// delivery while keeping the endpoints functional.
    pub api_key: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Public base URL used to build referral links and onboarding landing
    /// URLs, e.g. "https://example-practice.com".
    pub public_base_url: String,
    /// Admin account bootstrapped at startup.
    pub admin_email: String,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Read the config file when present; otherwise build entirely from
        // environment variables.
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: get_env("DATABASE_URL")
                            .unwrap_or_else(|| "sqlite://database.db?mode=rwc".to_string()),
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        session_expires_in: get_env_parse("JWT_SESSION_EXPIRES_IN", 86_400i64),
                        referral_expires_in: get_env_parse("JWT_REFERRAL_EXPIRES_IN", 86_400i64),
                    },
                    email: EmailConfig {
                        api_key: get_env("RESEND_API_KEY").unwrap_or_default(),
                        from_email: get_env("EMAIL_FROM")
                            .unwrap_or_else(|| "noreply@example-practice.com".to_string()),
                    },
                    app: AppConfig {
                        public_base_url: get_env("PUBLIC_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:8080".to_string()),
                        admin_email: get_env("ADMIN_EMAIL")
                            .unwrap_or_else(|| "admin@example-practice.com".to_string()),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Environment variables override file values when both are present.
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT") {
            if let Ok(p) = v.parse() {
                config.server.port = p;
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS") {
            if let Ok(mc) = v.parse() {
                config.database.max_connections = mc;
            }
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_SESSION_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.session_expires_in = n;
            }
        }
        if let Ok(v) = env::var("JWT_REFERRAL_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.referral_expires_in = n;
            }
        }
        if let Ok(v) = env::var("RESEND_API_KEY") {
            config.email.api_key = v;
        }
        if let Ok(v) = env::var("EMAIL_FROM") {
            config.email.from_email = v;
        }
        if let Ok(v) = env::var("PUBLIC_BASE_URL") {
            config.app.public_base_url = v;
        }
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            config.app.admin_email = v;
        }

        Ok(config)
    }
}
