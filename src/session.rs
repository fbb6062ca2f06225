//! Filesystem-backed sessions. One JSON file per session under the configured
//! directory, keyed by a random URL-safe id carried in a cookie.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use rocket::http::{Cookie, Status};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::AppError;
use crate::utils::random_token;

pub const SESSION_COOKIE: &str = "fablog";
pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub name: String,
}

impl SessionUser {
    pub fn is_logged_in(&self) -> bool {
        !self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: SessionUser,
    pub token: String,
}

impl SessionData {
    fn fresh() -> Self {
        SessionData {
            user: SessionUser::default(),
            token: random_token(TOKEN_BYTES),
        }
    }
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(SessionStore { dir })
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("sess_{id}.json"))
    }

    /// `Ok(None)` for a session that does not exist; an unreadable or
    /// malformed file is an error, not a fresh session.
    pub fn load(&self, id: &str) -> Result<Option<SessionData>, AppError> {
        match fs::read(self.path(id)) {
            Ok(bytes) => {
                let data = serde_json::from_slice(&bytes)
                    .map_err(|err| AppError::Session(format!("malformed session {id}: {err}")))?;
                Ok(Some(data))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, id: &str, data: &SessionData) -> Result<(), AppError> {
        let bytes = serde_json::to_vec(data)?;
        fs::write(self.path(id), bytes)?;
        Ok(())
    }

    pub fn destroy(&self, id: &str) -> Result<(), AppError> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Session ids come in from a cookie, so they are untrusted input. Only the
/// URL-safe alphabet the token generator emits may reach the filesystem.
fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub struct Session {
    pub id: String,
    pub data: SessionData,
}

/// Loads the caller's session, or creates one (empty user, fresh token) on
/// first contact. An unreadable session file fails the request with a 500.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Session, ()> {
        let Some(store) = request.rocket().state::<SessionStore>() else {
            return request::Outcome::Error((Status::InternalServerError, ()));
        };

        let jar = request.cookies();
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let id = cookie.value();
            if valid_session_id(id) {
                match store.load(id) {
                    Ok(Some(data)) => {
                        return request::Outcome::Success(Session {
                            id: id.to_string(),
                            data,
                        })
                    }
                    // A cookie pointing at no file is a stale client; fall
                    // through and hand out a fresh session.
                    Ok(None) => {}
                    Err(err) => {
                        error!("session load failed: {err}");
                        return request::Outcome::Error((Status::InternalServerError, ()));
                    }
                }
            }
        }

        let id = random_token(TOKEN_BYTES);
        let data = SessionData::fresh();
        if let Err(err) = store.save(&id, &data) {
            error!("session create failed: {err}");
            return request::Outcome::Error((Status::InternalServerError, ()));
        }
        jar.add(Cookie::build((SESSION_COOKIE, id.clone())).path("/").build());
        request::Outcome::Success(Session { id, data })
    }
}
