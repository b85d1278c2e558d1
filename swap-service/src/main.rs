use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swap_service::{
    config::Config,
    db::{create_pool, run_migrations},
    handlers,
    middleware::jwt_auth::JwtAuthMiddleware,
    security::jwt,
    workers::xp_awards,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    tracing::info!("Starting swap-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    jwt::initialize_keys(&config.jwt.secret)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    tracing::info!("JWT keys initialized");

    let db_pool = create_pool(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string()))?;

    tracing::info!(
        "Database pool created with {} max connections",
        config.database.max_connections
    );

    // Run migrations in non-production unless explicitly skipped
    let run_migrations_env = std::env::var("RUN_MIGRATIONS").unwrap_or_else(|_| "true".into());
    if !config.is_production() && run_migrations_env != "false" {
        tracing::info!("Running database migrations...");
        run_migrations(&db_pool)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        tracing::info!("Database migrations completed");
    } else {
        tracing::info!(
            "Skipping database migrations (RUN_MIGRATIONS={})",
            run_migrations_env
        );
    }

    // Retry loop for XP awards left behind by crashes
    xp_awards::spawn(db_pool.clone());
    tracing::info!("XP award worker spawned");

    let server_config = config.clone();
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    tracing::info!("Starting HTTP server at {}", bind_address);

    HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in &server_config.cors.allowed_origins {
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(server_config.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health::health))
                    .service(
                        web::scope("/auth")
                            .route("/signup", web::post().to(handlers::auth::signup))
                            .route("/login", web::post().to(handlers::auth::login)),
                    )
                    .service(
                        web::scope("/user")
                            .wrap(JwtAuthMiddleware)
                            .route("/me", web::get().to(handlers::users::me))
                            .route("/me", web::put().to(handlers::users::update_me))
                            .route("/search", web::get().to(handlers::users::search))
                            .route(
                                "/skills/suggestions",
                                web::get().to(handlers::users::skill_suggestions),
                            )
                            .route("/stats", web::get().to(handlers::users::stats))
                            // Literal routes above must come before the capture
                            .route("/{userId}", web::get().to(handlers::users::get_user)),
                    )
                    .service(
                        web::scope("/request")
                            .wrap(JwtAuthMiddleware)
                            .route("/received", web::get().to(handlers::requests::received))
                            .route("/sent", web::get().to(handlers::requests::sent))
                            .route("/stats", web::get().to(handlers::requests::stats))
                            .route(
                                "/{requestId}/accept",
                                web::post().to(handlers::requests::accept),
                            )
                            .route(
                                "/{requestId}/reject",
                                web::post().to(handlers::requests::reject),
                            )
                            .route("/{toUserId}", web::post().to(handlers::requests::create)),
                    )
                    .service(
                        web::scope("/chat")
                            .wrap(JwtAuthMiddleware)
                            .route("", web::get().to(handlers::chat::chat_list))
                            .route("/{userId}/read", web::post().to(handlers::chat::mark_read))
                            .route("/{userId}", web::post().to(handlers::chat::send))
                            .route("/{userId}", web::get().to(handlers::chat::history)),
                    )
                    .service(
                        web::scope("/report")
                            .wrap(JwtAuthMiddleware)
                            .route("/all", web::get().to(handlers::reports::list_all))
                            .route("/stats", web::get().to(handlers::reports::stats))
                            .route(
                                "/{reportedUserId}",
                                web::post().to(handlers::reports::create),
                            ),
                    )
                    .service(
                        web::scope("/admin")
                            .wrap(JwtAuthMiddleware)
                            .route("/users", web::get().to(handlers::admin::list_users))
                            .route("/dashboard", web::get().to(handlers::admin::dashboard))
                            .route(
                                "/reports/{reportId}/review",
                                web::put().to(handlers::reports::review),
                            )
                            .route(
                                "/user/{id}/block",
                                web::put().to(handlers::admin::block_user),
                            )
                            .route(
                                "/user/{id}/unblock",
                                web::put().to(handlers::admin::unblock_user),
                            )
                            .route(
                                "/user/{id}",
                                web::delete().to(handlers::admin::delete_user),
                            ),
                    ),
            )
    })
    .bind(&bind_address)?
    .workers(4)
    .run()
    .await
}
