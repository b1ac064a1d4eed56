mod auth;
mod config;
mod db;
mod error;
mod grading;
mod models;
mod routes;
mod unlock;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::Router;
use config::Config;
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Allowed characters for team join codes - excludes I, O, 0, 1 for readability
pub const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Length of generated join codes
pub const JOIN_CODE_LENGTH: usize = 5;

/// Generate a short, readable team join code (5 alphanumeric characters)
pub fn generate_join_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..JOIN_CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..JOIN_CODE_CHARSET.len());
            JOIN_CODE_CHARSET[idx] as char
        })
        .collect()
}

/// Application state shared across all handlers
pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    pub http_client: reqwest::Client,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "puzzlehunt_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting puzzle hunt backend server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = db::create_pool(config.database_url(), config.database.max_connections).await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    // Create shared HTTP client for identity provider calls
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    tracing::info!("HTTP client initialized");

    // Create application state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        http_client,
    });

    // Spawn background task that keeps team unlocks caught up with the
    // graph (covers hunt start and anything a crashed request missed)
    let sweep_state = state.clone();
    tokio::spawn(async move {
        unlock_sweep_task(sweep_state).await;
    });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Serve frontend static files
    let frontend_service = ServeDir::new(&config.server.frontend_dir);

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .fallback_service(frontend_service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API root: http://{}/api", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task that periodically re-runs the unlock computation for
/// every team of the current hunt
async fn unlock_sweep_task(state: Arc<AppState>) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(state.config.hunt.unlock_sweep_interval));

    loop {
        interval.tick().await;

        let hunt = match db::queries::get_current_hunt(&state.db).await {
            Ok(Some(hunt)) => hunt,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("unlock sweep could not load current hunt: {}", e);
                continue;
            }
        };

        // Nothing moves once the hunt is over.
        if hunt.is_public() {
            continue;
        }
        let locked = hunt.is_locked();

        let teams = match db::queries::list_teams(&state.db, hunt.hunt_id).await {
            Ok(teams) => teams,
            Err(e) => {
                tracing::error!("unlock sweep could not list teams: {}", e);
                continue;
            }
        };

        for team in teams {
            // Before the start date only playtester teams are live.
            if locked && team.is_normal_team() {
                continue;
            }
            if let Err(e) =
                unlock::recompute_team_unlocks(&state.db, hunt.hunt_id, team.team_id).await
            {
                tracing::error!("unlock sweep failed for team {}: {}", team.team_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_join_code_length() {
        // Generate multiple codes and verify they are always 5 characters
        for _ in 0..100 {
            let code = generate_join_code();
            assert_eq!(
                code.len(),
                JOIN_CODE_LENGTH,
                "Generated join code '{}' should be exactly {} characters",
                code,
                JOIN_CODE_LENGTH
            );
        }
    }

    #[test]
    fn test_generate_join_code_charset() {
        // Generate multiple codes and verify all characters are from allowed charset
        for _ in 0..100 {
            let code = generate_join_code();
            for c in code.chars() {
                assert!(
                    JOIN_CODE_CHARSET.contains(&(c as u8)),
                    "Character '{}' in code '{}' is not in allowed charset",
                    c,
                    code
                );
            }
        }
    }

    #[test]
    fn test_generate_join_code_uppercase() {
        // Generate multiple codes and verify all alphabetic characters are uppercase
        for _ in 0..100 {
            let code = generate_join_code();
            for c in code.chars() {
                if c.is_alphabetic() {
                    assert!(
                        c.is_uppercase(),
                        "Character '{}' in code '{}' should be uppercase",
                        c,
                        code
                    );
                }
            }
        }
    }
}
