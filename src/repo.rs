//! Data access layer. Entity-shaped reads assemble nested results from
//! multiple round trips; reads never surface an error to the HTTP layer and
//! instead degrade to partial data (see [`Fetched`]).

use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer, Text};
use serde::Serialize;
use tracing::warn;

use crate::db::schema::{articles, favorites, followings, users};
use crate::db::statements;
use crate::types::Fetched;

/// Applied when a caller asks for a non-positive page size.
pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub articles: Vec<Article>,
    pub followings: Vec<User>,
    pub followers: Vec<User>,
}

impl User {
    /// A lookup miss is the zero-valued user, not an error.
    pub fn exists(&self) -> bool {
        self.id != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Article {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub user_id: i32,
    pub author: User,
    pub favorites: Vec<Favorite>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Favorite {
    pub id: i32,
    pub article_id: i32,
    pub user_id: i32,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize)]
pub struct Following {
    pub id: i32,
    pub from_id: i32,
    pub to_id: i32,
}

#[derive(Queryable)]
struct UserRow {
    id: i32,
    name: String,
}

#[derive(Queryable)]
struct ArticleRow {
    id: i32,
    title: String,
    user_id: i32,
    content: String,
}

#[derive(QueryableByName)]
struct FeedRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Text)]
    title: String,
    #[diesel(sql_type = Integer)]
    user_id: i32,
    #[diesel(sql_type = Text)]
    content: String,
    #[diesel(sql_type = Integer)]
    author_id: i32,
    #[diesel(sql_type = Text)]
    author_name: String,
}

#[derive(QueryableByName)]
struct FavoriterRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Integer)]
    article_id: i32,
    #[diesel(sql_type = Integer)]
    user_id: i32,
    #[diesel(sql_type = Integer)]
    favoriter_id: i32,
    #[diesel(sql_type = Text)]
    favoriter_name: String,
}

/// The most recent articles, newest first, with the author embedded and the
/// favoriters attached by a secondary per-article query. A non-positive
/// `limit` falls back to [`DEFAULT_LIMIT`], a non-positive `offset` to 0.
pub fn list_articles(conn: &mut SqliteConnection, limit: i64, offset: i64) -> Fetched<Vec<Article>> {
    let limit = if limit < 1 { DEFAULT_LIMIT } else { limit };
    let offset = if offset < 1 { 0 } else { offset };

    let rows = sql_query(statements::FEED_PAGE)
        .bind::<BigInt, _>(limit)
        .bind::<BigInt, _>(offset)
        .load::<FeedRow>(conn);
    let rows = match rows {
        Ok(rows) => rows,
        Err(err) => return Fetched::Degraded(Vec::new(), err),
    };

    let mut feed = Vec::with_capacity(rows.len());
    let mut failure = None;
    for row in rows {
        let favorites = match get_favorites_for_article(conn, row.id) {
            Fetched::Complete(favorites) => favorites,
            Fetched::Degraded(favorites, err) => {
                failure.get_or_insert(err);
                favorites
            }
        };
        feed.push(Article {
            id: row.id,
            title: row.title,
            content: row.content,
            user_id: row.user_id,
            author: User {
                id: row.author_id,
                name: row.author_name,
                ..User::default()
            },
            favorites,
        });
    }

    match failure {
        None => Fetched::Complete(feed),
        Some(err) => Fetched::Degraded(feed, err),
    }
}

/// Favorite records for one article, each carrying the favoriting user's id
/// and name.
pub fn get_favorites_for_article(conn: &mut SqliteConnection, article_id: i32) -> Fetched<Vec<Favorite>> {
    let rows = sql_query(statements::ARTICLE_FAVORITERS)
        .bind::<Integer, _>(article_id)
        .load::<FavoriterRow>(conn);
    match rows {
        Ok(rows) => Fetched::Complete(
            rows.into_iter()
                .map(|row| Favorite {
                    id: row.id,
                    article_id: row.article_id,
                    user_id: row.user_id,
                    user: User {
                        id: row.favoriter_id,
                        name: row.favoriter_name,
                        ..User::default()
                    },
                })
                .collect(),
        ),
        Err(err) => Fetched::Degraded(Vec::new(), err),
    }
}

/// A user with the articles they authored. A missing id yields the
/// zero-valued user, never an error; callers check [`User::exists`].
pub fn get_user(conn: &mut SqliteConnection, id: i32) -> Fetched<User> {
    let row = users::table.find(id).first::<UserRow>(conn).optional();
    let row = match row {
        Ok(Some(row)) => row,
        Ok(None) => return Fetched::Complete(User::default()),
        Err(err) => return Fetched::Degraded(User::default(), err),
    };

    let mut user = User {
        id: row.id,
        name: row.name,
        ..User::default()
    };
    let written = articles::table
        .filter(articles::user_id.eq(user.id))
        .order(articles::id.asc())
        .load::<ArticleRow>(conn);
    match written {
        Ok(rows) => {
            user.articles = rows
                .into_iter()
                .map(|row| Article {
                    id: row.id,
                    title: row.title,
                    user_id: row.user_id,
                    content: row.content,
                    ..Article::default()
                })
                .collect();
            Fetched::Complete(user)
        }
        Err(err) => Fetched::Degraded(user, err),
    }
}

/// Users that `user_id` follows, in edge insertion order.
pub fn get_followings(conn: &mut SqliteConnection, user_id: i32) -> Fetched<Vec<User>> {
    let edges = followings::table
        .filter(followings::from_id.eq(user_id))
        .order(followings::id.asc())
        .load::<Following>(conn);
    resolve_edges(conn, edges, |edge| edge.to_id)
}

/// Users following `user_id`, in edge insertion order.
pub fn get_followers(conn: &mut SqliteConnection, user_id: i32) -> Fetched<Vec<User>> {
    let edges = followings::table
        .filter(followings::to_id.eq(user_id))
        .order(followings::id.asc())
        .load::<Following>(conn);
    resolve_edges(conn, edges, |edge| edge.from_id)
}

// Each edge resolves through a full get_user round trip. No batching.
fn resolve_edges(
    conn: &mut SqliteConnection,
    edges: QueryResult<Vec<Following>>,
    side: impl Fn(&Following) -> i32,
) -> Fetched<Vec<User>> {
    let edges = match edges {
        Ok(edges) => edges,
        Err(err) => return Fetched::Degraded(Vec::new(), err),
    };

    let mut resolved = Vec::with_capacity(edges.len());
    let mut failure = None;
    for edge in &edges {
        match get_user(conn, side(edge)) {
            Fetched::Complete(user) => resolved.push(user),
            Fetched::Degraded(user, err) => {
                failure.get_or_insert(err);
                resolved.push(user);
            }
        }
    }
    match failure {
        None => Fetched::Complete(resolved),
        Some(err) => Fetched::Degraded(resolved, err),
    }
}

/// Flat lookup for the login path. A query failure is logged and collapses
/// into "no such user".
pub fn find_user_by_name(conn: &mut SqliteConnection, name: &str) -> Option<User> {
    let row = users::table
        .filter(users::name.eq(name))
        .first::<UserRow>(conn)
        .optional();
    match row {
        Ok(row) => row.map(|row| User {
            id: row.id,
            name: row.name,
            ..User::default()
        }),
        Err(err) => {
            warn!("user lookup by name failed: {err}");
            None
        }
    }
}

pub fn insert_user(conn: &mut SqliteConnection, name: &str) -> QueryResult<usize> {
    diesel::insert_into(users::table)
        .values(users::name.eq(name))
        .execute(conn)
}

pub fn insert_article(
    conn: &mut SqliteConnection,
    title: &str,
    user_id: i32,
    content: &str,
) -> QueryResult<usize> {
    diesel::insert_into(articles::table)
        .values((
            articles::title.eq(title),
            articles::user_id.eq(user_id),
            articles::content.eq(content),
        ))
        .execute(conn)
}

pub fn insert_favorite(conn: &mut SqliteConnection, article_id: i32, user_id: i32) -> QueryResult<usize> {
    diesel::insert_into(favorites::table)
        .values((
            favorites::article_id.eq(article_id),
            favorites::user_id.eq(user_id),
        ))
        .execute(conn)
}

pub fn insert_following(conn: &mut SqliteConnection, from_id: i32, to_id: i32) -> QueryResult<usize> {
    diesel::insert_into(followings::table)
        .values((
            followings::from_id.eq(from_id),
            followings::to_id.eq(to_id),
        ))
        .execute(conn)
}

#[cfg(test)]
mod tests {
    use diesel::connection::SimpleConnection;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures::run_script;

    fn conn() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
        run_script(&mut conn, include_str!("../sql/create.sql")).expect("schema");
        conn
    }

    fn seed_users(conn: &mut SqliteConnection, names: &[&str]) {
        for name in names {
            insert_user(conn, name).expect("insert user");
        }
    }

    #[test]
    fn feed_applies_default_limit_and_offset() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice"]);
        for i in 1..=12 {
            insert_article(&mut conn, &format!("post {i}"), 1, "body").expect("insert article");
        }

        let feed = list_articles(&mut conn, 0, -3);
        assert!(!feed.is_degraded());
        let feed = feed.into_inner();
        assert_eq!(feed.len(), DEFAULT_LIMIT as usize);
        assert_eq!(feed.first().map(|a| a.id), Some(12));
        assert_eq!(feed.last().map(|a| a.id), Some(3));

        let page = list_articles(&mut conn, 2, 0).into_inner();
        assert_eq!(page.iter().map(|a| a.id).collect::<Vec<_>>(), vec![12, 11]);
    }

    #[test]
    fn feed_embeds_authors_and_favoriters_newest_first() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice", "bob", "carol"]);
        for (title, author) in [
            ("one", 1),
            ("two", 2),
            ("three", 3),
            ("four", 1),
            ("five", 2),
        ] {
            insert_article(&mut conn, title, author, "body").expect("insert article");
        }
        insert_favorite(&mut conn, 5, 2).expect("insert favorite");
        insert_favorite(&mut conn, 5, 3).expect("insert favorite");

        let page = list_articles(&mut conn, 2, 0).into_inner();
        assert_eq!(page.iter().map(|a| a.id).collect::<Vec<_>>(), vec![5, 4]);
        assert_eq!(page[0].author.name, "bob");
        assert_eq!(page[1].author.name, "alice");
        assert_eq!(
            page[0]
                .favorites
                .iter()
                .map(|f| f.user.name.as_str())
                .collect::<Vec<_>>(),
            vec!["bob", "carol"]
        );
        assert!(page[1].favorites.is_empty());
    }

    #[test]
    fn offset_skips_newest() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice"]);
        for i in 1..=5 {
            insert_article(&mut conn, &format!("post {i}"), 1, "body").expect("insert article");
        }

        let page = list_articles(&mut conn, 2, 2).into_inner();
        assert_eq!(page.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn missing_user_is_empty_not_an_error() {
        let mut conn = conn();
        let fetched = get_user(&mut conn, 42);
        assert!(!fetched.is_degraded());
        let user = fetched.into_inner();
        assert_eq!(user.id, 0);
        assert_eq!(user.name, "");
        assert!(!user.exists());
    }

    #[test]
    fn user_carries_authored_articles() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice", "bob"]);
        insert_article(&mut conn, "hers", 1, "body").expect("insert article");
        insert_article(&mut conn, "his", 2, "body").expect("insert article");
        insert_article(&mut conn, "hers again", 1, "body").expect("insert article");

        let user = get_user(&mut conn, 1).into_inner();
        assert!(user.exists());
        assert_eq!(user.name, "alice");
        assert_eq!(
            user.articles.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(),
            vec!["hers", "hers again"]
        );
    }

    #[test]
    fn follow_edges_show_on_both_sides() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice", "bob"]);
        insert_following(&mut conn, 1, 2).expect("insert following");

        let followings = get_followings(&mut conn, 1).into_inner();
        assert_eq!(followings.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(), vec!["bob"]);

        let followers = get_followers(&mut conn, 2).into_inner();
        assert_eq!(followers.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(), vec!["alice"]);

        assert!(get_followings(&mut conn, 2).into_inner().is_empty());
    }

    #[test]
    fn duplicate_favorites_are_kept() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice", "bob"]);
        insert_article(&mut conn, "post", 1, "body").expect("insert article");
        insert_favorite(&mut conn, 1, 2).expect("insert favorite");
        insert_favorite(&mut conn, 1, 2).expect("duplicate favorite");

        let favorites = get_favorites_for_article(&mut conn, 1).into_inner();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].user.name, "bob");
        assert_eq!(favorites[1].user.name, "bob");
    }

    #[test]
    fn find_user_by_name_is_exact() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice"]);
        assert_eq!(find_user_by_name(&mut conn, "alice").map(|u| u.id), Some(1));
        assert_eq!(find_user_by_name(&mut conn, "mallory"), None);
    }

    #[test]
    fn feed_degrades_but_keeps_rows_when_favorites_fail() {
        let mut conn = conn();
        seed_users(&mut conn, &["alice"]);
        for i in 1..=3 {
            insert_article(&mut conn, &format!("post {i}"), 1, "body").expect("insert article");
        }
        conn.batch_execute("DROP TABLE favorites").expect("drop");

        let fetched = list_articles(&mut conn, 0, 0);
        assert!(fetched.is_degraded());
        let feed = fetched.into_inner();
        assert_eq!(feed.len(), 3);
        assert!(feed.iter().all(|a| a.favorites.is_empty()));
    }
}
