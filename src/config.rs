use std::env;
use std::path::PathBuf;

use dotenv::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub sql_dir: PathBuf,
    pub fixture_dir: PathBuf,
    pub session_dir: PathBuf,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
    /// When nonzero, `/initialize` seeds this many random follow-edge samples
    /// on top of the followings fixture.
    pub random_follows: usize,
}

impl Config {
    pub fn from_env() -> Config {
        dotenv().ok();
        Config {
            database_url: var_or("DATABASE_URL", "fablog.db"),
            sql_dir: var_or("SQL_DIR", "sql").into(),
            fixture_dir: var_or("FIXTURE_DIR", "dummy").into(),
            session_dir: var_or("SESSION_DIR", "sess").into(),
            template_dir: var_or("TEMPLATE_DIR", "templates").into(),
            static_dir: var_or("STATIC_DIR", "static").into(),
            random_follows: env::var("RANDOM_FOLLOWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
