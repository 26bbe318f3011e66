#[macro_use]
extern crate log;
#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

pub mod api;
mod config;
pub mod error;
mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use rocket::{Build, Rocket};

/// Assemble the rocket: config, database, logging, and all API routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
        .register("/", catchers![error::default_catcher])
        .mount("/api", api::routes())
}

/// Get a database connection for tests, using the configured `db_uri`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(db_uri)
        .await
        .expect("Could not connect to database")
}

/// A fresh random database name, so concurrent tests do not collide.
#[cfg(test)]
pub(crate) fn database_name() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Assemble a rocket for tests against a specific database, bypassing the
/// database fairing so the test keeps a handle on the same database.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to create indexes");
    let config: Config = rocket::Config::figment()
        .extract()
        .expect("Failed to load application config");
    let admins = model::mongodb::Coll::from_db(&db);
    model::db::admin::ensure_admin_exists(&admins, &config)
        .await
        .expect("Failed to create default admin");

    rocket::build()
        .manage(config)
        .manage(client)
        .manage(db)
        .register("/", catchers![error::default_catcher])
        .mount("/api", api::routes())
}
