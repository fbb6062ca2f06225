use rocket::form::Form;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket_dyn_templates::{context, Template};
use tracing::error;

use crate::db::DbConnection;
use crate::repo;
use crate::session::Session;

/// Article feed. `l` and `o` arrive as free-form query input; anything
/// missing or unparsable falls back to the repository defaults (10 and 0).
#[get("/?<l>&<o>")]
pub fn index(mut conn: DbConnection, session: Session, l: Option<i64>, o: Option<i64>) -> Template {
    let articles = repo::list_articles(&mut conn, l.unwrap_or(0), o.unwrap_or(0)).into_inner();
    Template::render(
        "index",
        context! {
            articles: articles,
            user: session.data.user,
            token: session.data.token,
        },
    )
}

#[derive(Debug, FromForm)]
pub struct ArticleForm {
    title: String,
    content: String,
}

#[post("/article", data = "<form>")]
pub fn create(
    mut conn: DbConnection,
    session: Session,
    form: Form<ArticleForm>,
) -> Result<Redirect, (Status, &'static str)> {
    if !session.data.user.is_logged_in() {
        return Err((Status::Unauthorized, "login required"));
    }

    let form = form.into_inner();
    if form.title.trim().is_empty() || form.content.trim().is_empty() {
        return Err((Status::BadRequest, "title or content is empty"));
    }

    repo::insert_article(&mut conn, &form.title, session.data.user.id, &form.content).map_err(
        |err| {
            error!("article insert failed: {err}");
            (Status::InternalServerError, "could not save article")
        },
    )?;
    Ok(Redirect::to(uri!("/")))
}
