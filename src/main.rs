//! Clothier - clothing e-commerce backend.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clothier::auth::TokenSigner;
use clothier::config::Config;
use clothier::email::{LogMailer, Mailer, SmtpMailer};
use clothier::routes;
use clothier::store::postgres::PgStore;
use clothier::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP not configured, order emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    let operator_email = config.smtp.as_ref().map(|smtp| smtp.operator.clone());

    let store = Arc::new(PgStore::new(db));
    let state = AppState {
        products: store.clone(),
        carts: store.clone(),
        orders: store.clone(),
        users: store,
        mailer,
        tokens: Arc::new(TokenSigner::new(&config.jwt_secret, config.jwt_ttl_secs)),
        operator_email,
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("clothier listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
