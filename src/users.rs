use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::{context, Template};
use tracing::warn;

use crate::db::DbConnection;
use crate::repo;
use crate::session::{Session, SessionStore, SessionUser, SESSION_COOKIE};

#[get("/login")]
pub fn login_page(session: Session) -> Template {
    Template::render(
        "login",
        context! {
            user: session.data.user,
            token: session.data.token,
        },
    )
}

#[derive(Debug, FromForm)]
pub struct LoginForm {
    name: String,
    password: String,
}

/// The name is all that is checked; the password is required but never
/// verified against any stored credential. The generic rejection message must
/// not reveal whether the name exists.
#[post("/login", data = "<form>")]
pub fn login(
    mut conn: DbConnection,
    mut session: Session,
    store: &State<SessionStore>,
    form: Form<LoginForm>,
) -> Result<Redirect, (Status, &'static str)> {
    if session.data.user.is_logged_in() {
        return Ok(Redirect::permanent(uri!("/")));
    }

    let form = form.into_inner();
    if form.name.is_empty() || form.password.is_empty() {
        return Err((Status::BadRequest, "name or password is empty"));
    }

    match repo::find_user_by_name(&mut conn, &form.name) {
        Some(user) => {
            session.data.user = SessionUser {
                id: user.id,
                name: user.name,
            };
            if let Err(err) = store.save(&session.id, &session.data) {
                warn!("session save failed: {err}");
                return Err((Status::InternalServerError, "could not save session"));
            }
            Ok(Redirect::moved(uri!("/")))
        }
        None => Err((Status::BadRequest, "wrong name or password")),
    }
}

/// Logout only honors a token matching the one stored in the session; on a
/// mismatch the session is left untouched and the caller is sent home.
#[get("/logout?<token>")]
pub fn logout(
    session: Session,
    store: &State<SessionStore>,
    jar: &CookieJar<'_>,
    token: Option<String>,
) -> Redirect {
    if token.as_deref() == Some(session.data.token.as_str()) {
        if let Err(err) = store.destroy(&session.id) {
            warn!("session destroy failed: {err}");
        }
        jar.remove(Cookie::from(SESSION_COOKIE));
    }
    Redirect::moved(uri!("/"))
}
