// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Maximum number of questions handed out by `GET /api/questions`.
pub const QUESTION_LIMIT: usize = 100;

/// Accepted warnings before the session is force-submitted.
pub const MAX_WARNINGS: u32 = 3;

/// Shared debounce window across all violation sources.
pub const WARNING_COOLDOWN_MS: i64 = 1500;

/// Total exam time (60 minutes).
pub const EXAM_DURATION_SECONDS: u32 = 60 * 60;

/// Countdown granularity.
pub const TIMER_TICK_MS: u64 = 1000;

/// Outer/inner viewport gap that suggests docked devtools.
pub const DEVTOOLS_GAP_PX: i32 = 170;

pub const VIEWPORT_POLL_MS: u64 = 1200;

/// Animation-frame delay treated as a capture/background stall.
pub const FRAME_STALL_MS: f64 = 2500.0;

/// Obfuscation overlay: fully opaque until fade, removed afterwards.
pub const OVERLAY_FADE_AFTER_MS: u64 = 500;
pub const OVERLAY_REMOVE_AFTER_MS: u64 = 1500;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub public_dir: String,
    pub admin_password: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub port: u16,
    pub rust_log: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());

        let public_dir = env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string());

        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Self {
            data_dir,
            public_dir,
            admin_password,
            jwt_secret,
            jwt_expiration,
            port,
            rust_log,
            allowed_origins,
        }
    }
}
