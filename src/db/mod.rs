use std::ops::{Deref, DerefMut};

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, PooledConnection};
use diesel::SqliteConnection;
use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};

pub mod schema;
pub mod statements;

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Runs once per pooled connection. SQLite leaves referential integrity off
/// unless asked, and the busy timeout keeps a second writer from failing
/// immediately on a locked database file.
#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub struct DbConnection(pub PooledConnection<ConnectionManager<SqliteConnection>>);

pub fn init_pool(database_url: &str) -> Result<Pool, r2d2::Error> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .connection_customizer(Box::new(ConnectionPragmas))
        .build(manager)
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        match request.rocket().state::<Pool>() {
            Some(pool) => match pool.get() {
                Ok(conn) => request::Outcome::Success(DbConnection(conn)),
                Err(_) => request::Outcome::Error((Status::ServiceUnavailable, ())),
            },
            None => request::Outcome::Error((Status::InternalServerError, ())),
        }
    }
}

// For the convenience of using a &mut DbConnection as a &mut SqliteConnection.
impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
