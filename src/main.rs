extern crate dotenvy;

use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use dotenvy::dotenv;
use std::env;

pub mod auth;
pub mod bmi;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod schema;
pub mod service;

// Database connection pool type
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    // create db connection pool
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .context("failed to create database pool")?;

    let auth_settings = auth::AuthSettings::from_env()?;
    let patient_service =
        service::PatientService::new(repository::DieselPatientRepository::new(pool.clone()));

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("listening on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(auth_settings.clone()))
            .app_data(web::Data::new(patient_service.clone()))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(handlers::register_doctor))
                    .route("/login", web::post().to(handlers::login_doctor))
                    .route("/me", web::get().to(handlers::current_doctor)),
            )
            .service(
                web::scope("/patients")
                    .route("", web::post().to(handlers::create_patient))
                    .route("", web::get().to(handlers::list_patients))
                    .route("/{patient_id}", web::get().to(handlers::get_patient))
                    .route("/{patient_id}", web::put().to(handlers::update_patient))
                    .route("/{patient_id}", web::delete().to(handlers::delete_patient)),
            )
            .route("/", web::get().to(handlers::index))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
