use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursedesk::config::Config;
use coursedesk::db::{create_pool, init_audit_db, init_db, queries, AppState};
use coursedesk::handlers;
use coursedesk::middleware::AuthVerifier;
use coursedesk::models::{CreateBundle, CreateCourse, CreateUser, UserRole};
use coursedesk::payments::StripeClient;
use coursedesk::storage::BlobStorage;

#[derive(Parser, Debug)]
#[command(name = "coursedesk")]
#[command(about = "Course-sales platform backend")]
struct Cli {
    /// Seed the database with dev data (admin user, sample course, bundle)
    #[arg(long)]
    seed: bool,

    /// Delete databases on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_users(&conn).expect("Failed to count users");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("Seeding dev data");

    let admin = queries::create_user(
        &conn,
        &CreateUser {
            email: "admin@coursedesk.local".to_string(),
            name: Some("Dev Admin".to_string()),
            role: UserRole::Admin,
        },
    )
    .expect("Failed to create dev admin");

    let course = queries::create_course(
        &mut conn,
        &CreateCourse {
            title: "Intro to Trading".into(),
            description: Some("A sample course for local development".into()),
            price_cents: 4999,
            category: "trading".to_string(),
            level: "beginner".to_string(),
            is_public: true,
        },
    )
    .expect("Failed to create dev course");

    let bundle = queries::create_bundle(
        &mut conn,
        &CreateBundle {
            title: "Starter Pack".into(),
            description: None,
            price_cents: 7999,
            course_ids: vec![course.id.clone()],
            is_public: true,
        },
    )
    .expect("Failed to create dev bundle");

    // Copy-paste friendly output: mint a dev JWT with this sub to act as
    // the admin (JWT_SECRET defaults to "dev-secret" in dev mode).
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  admin_user_id: {}", admin.id);
    println!("  admin_email: {}", admin.email);
    println!("  course_id: {}", course.id);
    println!("  bundle_id: {}", bundle.bundle.id);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursedesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    // Create database connection pools
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    let audit_pool =
        create_pool(&config.audit_database_path).expect("Failed to create audit database pool");

    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }
    {
        let conn = audit_pool.get().expect("Failed to get audit connection");
        init_audit_db(&conn).expect("Failed to initialize audit database");
    }

    // External clients. Both are optional: without Stripe, checkout takes
    // the dev-mode direct-grant path; without S3, uploads are rejected.
    let stripe = match (
        config.stripe_secret_key.clone(),
        config.stripe_webhook_secret.clone(),
    ) {
        (Some(secret), Some(webhook)) => Some(Arc::new(StripeClient::new(secret, webhook))),
        _ => {
            tracing::warn!("Stripe not configured: purchases will be granted directly (dev mode)");
            None
        }
    };

    let storage = match config.s3_bucket.clone() {
        Some(bucket) => Some(Arc::new(
            BlobStorage::new(
                bucket,
                config.s3_region.clone(),
                config.s3_endpoint.clone(),
                config.s3_public_url.clone(),
            )
            .await,
        )),
        None => {
            tracing::warn!("Blob storage not configured: media uploads will be rejected");
            None
        }
    };

    let state = AppState {
        db: db_pool,
        audit: audit_pool,
        storage,
        stripe,
        auth: Arc::new(AuthVerifier::new(&config.jwt_secret)),
        base_url: config.base_url.clone(),
        success_page_url: config.success_page_url.clone(),
        cancel_page_url: config.cancel_page_url.clone(),
        currency: config.currency.clone(),
        audit_log_enabled: config.audit_log_enabled,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set COURSEDESK_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Promote the bootstrap admin if configured and already known.
    if let Some(ref email) = config.bootstrap_admin_email {
        let conn = state.db.get().expect("Failed to get connection");
        match queries::promote_admin_by_email(&conn, email) {
            Ok(true) => tracing::info!("Bootstrap admin promoted: {}", email),
            Ok(false) => tracing::warn!(
                "Bootstrap admin {} not found yet; restart after their first login",
                email
            ),
            Err(e) => tracing::error!("Failed to promote bootstrap admin: {}", e),
        }
    }

    // Build the application router
    let app = Router::new()
        // Public catalog + authenticated buyer endpoints
        .merge(handlers::public::router(state.clone()))
        // Webhook endpoints (signature auth)
        .merge(handlers::webhooks::router())
        // Admin API (admin JWT auth)
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    let audit_path = config.audit_database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: databases will be deleted on exit");
    }

    tracing::info!("Coursedesk server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral databases...");
        for path in [&db_path, &audit_path] {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("Failed to remove {}: {}", path, e);
            }
            // Also remove WAL and SHM files if they exist
            let _ = std::fs::remove_file(format!("{}-wal", path));
            let _ = std::fs::remove_file(format!("{}-shm", path));
        }
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
