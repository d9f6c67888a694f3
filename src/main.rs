use std::{sync::Arc, time::Duration};

use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use jsonwebtoken::{Header, Validation};

use store::{MemoryStore, NoteStore, PgStore, UserStore};

mod auth;
mod errors;
mod handlers;
mod models;
mod order;
mod schema;
mod seed;
mod store;
mod utils;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub struct AppState {
    pub secret: String,
    pub jwt_header: Header,
    pub jwt_validator: Validation,
    pub token_lifetime: Duration,
    pub notes: Arc<dyn NoteStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(
        secret: String,
        token_lifetime_secs: u64,
        notes: Arc<dyn NoteStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        AppState {
            secret,
            jwt_header: Header::default(),
            jwt_validator: Validation::default(),
            token_lifetime: Duration::from_secs(token_lifetime_secs),
            notes,
            users,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value: {value}")),
        Err(_) => default,
    }
}

fn postgres_store() -> Arc<PgStore> {
    let database_url = std::env::var("DATABASE_URL").expect("env DATABASE_URL");
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .expect("failed to create a pg pool");

    let mut pooled = pool.get().expect("failed to get a pg connection");
    let connection: &mut PgConnection = &mut pooled;
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");
    log::info!("applied {} pending migration(s)", applied.len());

    Arc::new(PgStore::new(pool))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let secret = std::env::var("SECRET_KEY").expect("env SECRET_KEY");
    let port = std::env::var("PORT").expect("env PORT");
    let token_lifetime = env_or("TOKEN_LIFETIME_SECS", 86_400u64);
    let per_second = env_or("RATE_LIMIT_PER_SECOND", 2u64);
    let burst_size = env_or("RATE_LIMIT_BURST", 120u32);

    let (notes, users): (Arc<dyn NoteStore>, Arc<dyn UserStore>) =
        match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => {
                log::warn!("using the in-memory store, notes will not survive a restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
            Ok("postgres") | Err(_) => {
                let store = postgres_store();
                (store.clone(), store)
            }
            Ok(other) => panic!("unknown STORE_BACKEND: {other}"),
        };

    if env_or("SEED_DEMO_USER", false) {
        seed::demo_user(users.as_ref(), notes.as_ref()).expect("failed to seed demo user");
    }

    let state = web::Data::new(AppState::new(secret, token_lifetime, notes, users));
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(per_second)
        .burst_size(burst_size)
        .finish()
        .expect("invalid rate limit configuration");

    log::info!("listening on 0.0.0.0:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Governor::new(&governor_conf))
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
