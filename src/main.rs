#[macro_use]
extern crate rocket;

use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use tracing_subscriber::{fmt, EnvFilter};

mod article;
mod config;
mod db;
mod fixtures;
mod profile;
mod repo;
mod session;
mod types;
mod users;
mod utils;


use config::Config;
use session::SessionStore;

#[get("/favicon.ico")]
fn favicon() -> Status {
    Status::NotFound
}

#[catch(404)]
fn not_found() -> &'static str {
    "404 not found"
}

/// Failures here are configuration-time failures: cannot open the database,
/// cannot replay the schema script, cannot open the session store. They abort
/// the process instead of degrading into a half-working server.
fn rocket(config: Config) -> Rocket<Build> {
    let pool = db::init_pool(&config.database_url).expect("failed to create database pool");
    {
        let mut conn = pool.get().expect("failed to get a bootstrap connection");
        fixtures::run_schema(&mut conn, &config.sql_dir).expect("failed to replay schema script");
    }
    let store = SessionStore::open(&config.session_dir).expect("failed to open session store");

    let figment = rocket::Config::figment()
        .merge(("template_dir", config.template_dir.display().to_string()));

    rocket::custom(figment)
        .manage(pool)
        .manage(store)
        .mount(
            "/",
            routes![
                article::index,
                article::create,
                profile::profile,
                users::login_page,
                users::login,
                users::logout,
                fixtures::initialize,
                fixtures::initialize_post,
                favicon,
            ],
        )
        .mount("/js", FileServer::from(config.static_dir.join("js")))
        .mount("/css", FileServer::from(config.static_dir.join("css")))
        .register("/", catchers![not_found])
        .manage(config)
        .attach(Template::fairing())
}

#[launch]
fn ignite() -> _ {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    rocket(Config::from_env())
}
