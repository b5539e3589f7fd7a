use actix_web::{App, HttpResponse, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use serde_json::json;
use std::io::Write; // for env_logger custom formatter

use referral_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::EmailService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    push::DisplayBroker,
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "Referral API is running"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.session_expires_in,
        config.jwt.referral_expires_in,
    );

    let email_service = EmailService::new(config.email.clone());
    if !email_service.enabled() {
        log::warn!("No email API key configured; outbound email is disabled");
    }

    let broker = DisplayBroker::new();

    let user_service = UserService::new(pool.clone());
    let referral_service = ReferralService::new(
        pool.clone(),
        email_service.clone(),
        config.app.public_base_url.clone(),
    );
    let auth_service = AuthService::new(
        pool.clone(),
        jwt_service.clone(),
        email_service.clone(),
        user_service.clone(),
        referral_service.clone(),
    );
    let onboarding_service = OnboardingService::new(
        pool.clone(),
        email_service.clone(),
        user_service.clone(),
        broker.clone(),
        config.app.public_base_url.clone(),
    );

    user_service
        .ensure_admin(&config.app.admin_email)
        .await
        .expect("Failed to bootstrap admin user");

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(broker.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(referral_service.clone()))
            .app_data(web::Data::new(onboarding_service.clone()))
            .configure(swagger_config)
            .route("/", web::get().to(health))
            .route("/health", web::get().to(health))
            .configure(handlers::auth_config)
            .configure(handlers::referral_config)
            .configure(handlers::onboarding_config)
            .configure(handlers::display_config)
            .configure(handlers::admin_config)
            .service(web::scope("/api").configure(handlers::user_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
