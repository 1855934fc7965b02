use crate::{
    app_state::AppState,
    authentication::AuthorizedSessionLayer,
    configuration::{DatabaseSettings, Settings},
    notifications::Notifier,
    payment_client::WebhookVerifier,
    routes::{accounts, entitlements, health_check, messages, notifications, payments},
    telemetry::{RequestSpan, RequestUuid},
};
use anyhow::{anyhow, Context};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{net::SocketAddr, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tower_sessions::{cookie::Key, service::PrivateCookie, SessionManagerLayer};
use tower_sessions_redis_store::{fred::prelude::*, RedisStore};

pub struct Application {
    local_addr: SocketAddr,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let db_pool = get_connection_pool(&config.database);
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to migrate the database")?;

        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind to {address}"))?;
        let local_addr = listener.local_addr()?;

        let session_layer = session_layer(&config).await?;
        let cors_layer = cors_layer(&config.application.cors_origin)?;

        let app_state = AppState {
            db_pool: db_pool.clone(),
            payment_client: config.payments.client()?,
            webhook_verifier: WebhookVerifier::new(
                config.payments.webhook_secret.clone(),
                config.payments.webhook_tolerance(),
            ),
            prices: config.payments.prices.table(),
            notifier: Notifier::new(
                db_pool.clone(),
                config.email_client.client()?,
                config.notifications.cooldown(),
                config.application.base_url.clone(),
            ),
        };

        let protected = Router::new()
            .merge(messages::router(db_pool))
            .merge(entitlements::router())
            .merge(notifications::router())
            .merge(payments::subscribe_router())
            .route_layer(AuthorizedSessionLayer);

        let router = Router::new()
            .merge(protected)
            .merge(accounts::router())
            .merge(payments::webhook_router())
            .merge(health_check::router())
            .with_state(app_state)
            .layer(session_layer)
            .layer(cors_layer)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
            .layer(SetRequestIdLayer::x_request_id(RequestUuid));

        Ok(Self {
            local_addr,
            listener,
            router,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        tracing::info!("Listening on {}", self.local_addr);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

pub fn get_connection_pool(config: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy_with(config.with_db())
}

async fn session_layer(
    config: &Settings,
) -> Result<SessionManagerLayer<RedisStore<RedisPool>, PrivateCookie>, anyhow::Error> {
    let redis_pool = RedisPool::new(
        RedisConfig::from_url(config.redis_uri.expose_secret())?,
        None,
        None,
        None,
        6,
    )?;
    redis_pool.connect();
    redis_pool
        .wait_for_connect()
        .await
        .context("Failed to connect to Redis")?;

    let key = Key::try_from(config.application.hmac_secret.expose_secret().as_bytes())
        .map_err(|e| anyhow!("Session key must be at least 64 bytes long: {e:?}"))?;

    Ok(SessionManagerLayer::new(RedisStore::new(redis_pool))
        .with_private(key)
        .with_secure(config.application.base_url.starts_with("https://")))
}

fn cors_layer(origin: &str) -> Result<CorsLayer, anyhow::Error> {
    let origin = HeaderValue::from_str(origin).context("Invalid CORS origin")?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received ctrl+C signal, shutting down"),
        Err(e) => {
            tracing::error!("Failed to listen for the shutdown signal: {e:?}");
            std::future::pending::<()>().await
        }
    }
}
