use rocket_dyn_templates::{context, Template};

use crate::db::DbConnection;
use crate::repo;
use crate::session::Session;

/// User profile: name, authored articles, followings, followers. An id with
/// no matching row renders the empty user rather than a 404; a non-numeric
/// path segment never reaches this handler and 404s instead.
#[get("/user/<id>")]
pub fn profile(mut conn: DbConnection, session: Session, id: i32) -> Template {
    let mut user = repo::get_user(&mut conn, id).into_inner();
    user.followings = repo::get_followings(&mut conn, id).into_inner();
    user.followers = repo::get_followers(&mut conn, id).into_inner();
    Template::render(
        "user",
        context! {
            user: user,
            current: session.data.user,
            token: session.data.token,
        },
    )
}
