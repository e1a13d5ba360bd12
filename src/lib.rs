pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::config::AppConfig;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub upload_max_bytes: usize,
    pub identity_key: [u8; 32],
    pub identity_login_url: Option<String>,
    pub session_ttl_hours: u64,
    pub session_cookie_secure: bool,
}

impl AppState {
    pub fn new(db: Db, config: &AppConfig) -> Self {
        Self {
            db,
            upload_max_bytes: config.upload_max_bytes,
            identity_key: config.identity_key,
            identity_login_url: config.identity_login_url.clone(),
            session_ttl_hours: config.session_ttl_hours,
            session_cookie_secure: config.session_cookie_secure,
        }
    }
}
