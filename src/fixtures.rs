//! Schema replay and fixture seeding behind `/initialize`.
//!
//! The endpoint drops and recreates every table, then reloads the JSON
//! fixture files through the repository write path. It has no access control
//! and is destructive: an operator-only maintenance action, not a public API.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::{QueryResult, SqliteConnection};
use rand::Rng;
use rocket::State;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::DbConnection;
use crate::repo;
use crate::session::Session;
use crate::types::AppError;

pub const SCHEMA_FILE: &str = "create.sql";
/// Synthetic follow edges are sampled from 1..=MAX_ID on both sides.
pub const FOLLOW_GRAPH_MAX_ID: i32 = 100;

/// Replays a SQL script whose statements are separated by blank lines.
pub fn run_script(conn: &mut SqliteConnection, script: &str) -> QueryResult<()> {
    for chunk in script.split("\n\n") {
        let statement = chunk.trim();
        if statement.is_empty() {
            continue;
        }
        conn.batch_execute(statement)?;
    }
    Ok(())
}

pub fn run_schema(conn: &mut SqliteConnection, sql_dir: &Path) -> Result<(), AppError> {
    let script = std::fs::read_to_string(sql_dir.join(SCHEMA_FILE))?;
    run_script(conn, &script)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UserSeed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArticleSeed {
    title: String,
    user_id: i32,
    content: String,
}

#[derive(Debug, Deserialize)]
struct FavoriteSeed {
    article_id: i32,
    user_id: i32,
}

#[derive(Debug, Deserialize)]
struct FollowingSeed {
    from_id: i32,
    to_id: i32,
}

fn read_fixture<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>, AppError> {
    let file = File::open(dir.join(file))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Loads the four fixture files in dependency order. A row that fails to
/// insert is logged and skipped; a missing or unparsable file aborts.
pub fn load_fixtures(conn: &mut SqliteConnection, dir: &Path) -> Result<(), AppError> {
    let users: Vec<UserSeed> = read_fixture(dir, "users.json")?;
    for seed in &users {
        log_insert(repo::insert_user(conn, &seed.name), "user");
    }
    info!("users set");

    let articles: Vec<ArticleSeed> = read_fixture(dir, "articles.json")?;
    for seed in &articles {
        log_insert(
            repo::insert_article(conn, &seed.title, seed.user_id, &seed.content),
            "article",
        );
    }
    info!("articles set");

    let favorites: Vec<FavoriteSeed> = read_fixture(dir, "favorites.json")?;
    for seed in &favorites {
        log_insert(repo::insert_favorite(conn, seed.article_id, seed.user_id), "favorite");
    }
    info!("favorites set");

    let followings: Vec<FollowingSeed> = read_fixture(dir, "followings.json")?;
    for seed in &followings {
        log_insert(repo::insert_following(conn, seed.from_id, seed.to_id), "following");
    }
    info!("followings set");

    Ok(())
}

fn log_insert(result: QueryResult<usize>, what: &str) {
    if let Err(err) = result {
        warn!("skipping {what} row: {err}");
    }
}

/// Samples `samples` random (from, to) pairs over 1..=`max_id` and drops
/// duplicates, so the result holds at most `samples` distinct edges in a
/// deterministic order. Self-follows are possible.
pub fn generate_follow_graph<R: Rng>(rng: &mut R, samples: usize, max_id: i32) -> Vec<(i32, i32)> {
    let mut marked = BTreeSet::new();
    for _ in 0..samples {
        let from = rng.gen_range(1..=max_id);
        let to = rng.gen_range(1..=max_id);
        marked.insert((from, to));
    }
    marked.into_iter().collect()
}

fn run_initialize(conn: &mut SqliteConnection, config: &Config) -> Result<&'static str, AppError> {
    run_schema(conn, &config.sql_dir)?;
    load_fixtures(conn, &config.fixture_dir)?;

    if config.random_follows > 0 {
        let edges =
            generate_follow_graph(&mut rand::thread_rng(), config.random_follows, FOLLOW_GRAPH_MAX_ID);
        for (from, to) in edges {
            log_insert(repo::insert_following(conn, from, to), "generated following");
        }
        info!("generated followings set");
    }

    Ok("done")
}

#[get("/initialize")]
pub fn initialize(
    mut conn: DbConnection,
    _session: Session,
    config: &State<Config>,
) -> Result<&'static str, AppError> {
    run_initialize(&mut conn, config)
}

#[post("/initialize")]
pub fn initialize_post(
    mut conn: DbConnection,
    _session: Session,
    config: &State<Config>,
) -> Result<&'static str, AppError> {
    run_initialize(&mut conn, config)
}

#[cfg(test)]
mod tests {
    use diesel::dsl::count_star;
    use diesel::prelude::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::db::schema::{articles, favorites, followings, users};

    const SCHEMA: &str = include_str!("../sql/create.sql");

    fn conn() -> SqliteConnection {
        SqliteConnection::establish(":memory:").expect("in-memory sqlite")
    }

    fn counts(conn: &mut SqliteConnection) -> (i64, i64, i64, i64) {
        (
            users::table.select(count_star()).first(conn).expect("users"),
            articles::table.select(count_star()).first(conn).expect("articles"),
            favorites::table.select(count_star()).first(conn).expect("favorites"),
            followings::table.select(count_star()).first(conn).expect("followings"),
        )
    }

    #[test]
    fn script_replay_is_idempotent() {
        let mut conn = conn();
        run_script(&mut conn, SCHEMA).expect("first replay");
        repo::insert_user(&mut conn, "alice").expect("insert");
        run_script(&mut conn, SCHEMA).expect("second replay");
        assert_eq!(counts(&mut conn), (0, 0, 0, 0));
    }

    #[test]
    fn fixtures_load_in_dependency_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            tmp.path().join("users.json"),
            r#"[{"id":1,"name":"alice"},{"id":2,"name":"bob"}]"#,
        )
        .expect("users.json");
        std::fs::write(
            tmp.path().join("articles.json"),
            r#"[{"id":1,"title":"t","user_id":1,"content":"c"}]"#,
        )
        .expect("articles.json");
        std::fs::write(
            tmp.path().join("favorites.json"),
            r#"[{"id":1,"article_id":1,"user_id":2}]"#,
        )
        .expect("favorites.json");
        std::fs::write(
            tmp.path().join("followings.json"),
            r#"[{"id":1,"from_id":2,"to_id":1}]"#,
        )
        .expect("followings.json");

        let mut conn = conn();
        run_script(&mut conn, SCHEMA).expect("schema");
        load_fixtures(&mut conn, tmp.path()).expect("load");
        assert_eq!(counts(&mut conn), (2, 1, 1, 1));
    }

    #[test]
    fn missing_fixture_file_aborts() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut conn = conn();
        run_script(&mut conn, SCHEMA).expect("schema");
        assert!(load_fixtures(&mut conn, tmp.path()).is_err());
    }

    #[test]
    fn follow_graph_samples_are_deduplicated_and_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let edges = generate_follow_graph(&mut rng, 1000, 100);
        assert!(edges.len() <= 1000);
        assert!(!edges.is_empty());
        let distinct: BTreeSet<_> = edges.iter().collect();
        assert_eq!(distinct.len(), edges.len());
        assert!(edges
            .iter()
            .all(|&(from, to)| (1..=100).contains(&from) && (1..=100).contains(&to)));
    }
}
