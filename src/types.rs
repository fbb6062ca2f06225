use diesel::result::Error as DieselError;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] DieselError),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session store corrupted: {0}")]
    Session(String),
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        error!("request failed: {self}");
        match self {
            AppError::Db(DieselError::NotFound) => Err(Status::NotFound),
            _ => Err(Status::InternalServerError),
        }
    }
}

/// Outcome of a best-effort read. A failed query degrades to whatever was
/// accumulated before the failure instead of surfacing an error page, but the
/// two cases stay distinguishable for callers that care (tests do).
#[derive(Debug)]
pub enum Fetched<T> {
    Complete(T),
    Degraded(T, DieselError),
}

impl<T> Fetched<T> {
    /// Collapses both outcomes into the carried value, logging the degraded
    /// case. This is what the HTTP layer renders.
    pub fn into_inner(self) -> T {
        match self {
            Fetched::Complete(value) => value,
            Fetched::Degraded(value, err) => {
                warn!("rendering partial data: {err}");
                value
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Degraded(..))
    }
}
