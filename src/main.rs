//! VPN Shop - Entry point.
//!
//! Wires configuration, the database pool and the outbound clients into the
//! payment orchestrator, spawns the background loops, and serves the webhook
//! listener until Ctrl-C.

use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vpn_shop::adapters::http::{app_router, health_router, HttpSettings, WebhookAppState};
use vpn_shop::adapters::postgres::{
    PostgresCustomerRepository, PostgresProcessedWebhookStore, PostgresPurchaseRepository,
    PostgresReferralRepository,
};
use vpn_shop::adapters::translation::CatalogError;
use vpn_shop::adapters::{
    CryptoPayClient, CryptoPayConfig, FileMessageCatalog, GatewayClient, GatewayConfig,
    PanelClient, SubscriptionLinkBackend, TelegramBotClient, TelegramConfig,
};
use vpn_shop::application::{
    spawn_expiration_notifier, spawn_poller, ExpirationConfig, ExpirationNotifier,
    InvoicePoller, OrchestratorSettings, PaymentOrchestrator, PollerConfig, WebhookRetention,
};
use vpn_shop::config::{self, AppConfig};
use vpn_shop::domain::webhook::SignatureVerifier;
use vpn_shop::ports::{
    BackendError, CustomerRepository, InvoiceLookup, ProcessedWebhookStore, ProvisionError,
    PurchaseRepository,
};

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ValidationError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("translations: {0}")]
    Catalog(#[from] CatalogError),

    #[error("panel client: {0}")]
    Panel(#[from] ProvisionError),

    #[error("payment client: {0}")]
    Backend(#[from] BackendError),

    #[error("chat client: {0}")]
    Chat(#[from] reqwest::Error),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!(error = %e, "VPN shop exited with error");
        std::process::exit(1);
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    config.validate()?;
    info!(environment = ?config.server.environment, "Starting VPN shop");

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    let purchases: Arc<dyn PurchaseRepository> =
        Arc::new(PostgresPurchaseRepository::new(pool.clone()));
    let customers: Arc<dyn CustomerRepository> =
        Arc::new(PostgresCustomerRepository::new(pool.clone()));
    let processed: Arc<dyn ProcessedWebhookStore> =
        Arc::new(PostgresProcessedWebhookStore::new(pool.clone()));

    let chat = Arc::new(chat_client(&config)?);
    let catalog = Arc::new(build_catalog(&config)?);
    let orchestrator = Arc::new(build_orchestrator(
        &config,
        &pool,
        Collaborators {
            purchases: purchases.clone(),
            customers: customers.clone(),
            chat: chat.clone(),
            catalog: catalog.clone(),
        },
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let poller_config = PollerConfig {
        poll_interval: config.scheduler.poll_interval(),
        tick_timeout: config.scheduler.poll_timeout(),
        max_concurrent_lookups: config.scheduler.poll_concurrency,
    };
    for lookup in build_lookups(&config)? {
        let poller = InvoicePoller::new(lookup, purchases.clone(), orchestrator.clone())
            .with_config(poller_config.clone());
        tasks.push(spawn_poller(poller, shutdown_rx.clone()));
    }

    let expiration = ExpirationNotifier::new(
        customers.clone(),
        purchases.clone(),
        orchestrator.clone(),
        chat,
        catalog,
    )
    .with_config(ExpirationConfig {
        run_hour_utc: config.scheduler.expiration_hour_utc,
        lookahead_days: config.scheduler.lookahead_days,
    });
    tasks.push(spawn_expiration_notifier(expiration, shutdown_rx.clone()));

    let retention =
        WebhookRetention::new(processed.clone(), config.scheduler.webhook_retention_days);
    let retention_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move { retention.run(retention_shutdown).await }));

    let settings = HttpSettings {
        request_timeout: config.server.request_timeout(),
        body_limit_bytes: config.server.max_body_bytes,
    };
    let webhook = &config.payment.subscription_webhook;
    let app = match (&webhook.secret, webhook.enabled) {
        (Some(secret), true) => {
            let state = WebhookAppState {
                verifier: SignatureVerifier::new(secret.clone()),
                customers,
                processed,
                orchestrator,
            };
            app_router(state, settings)
        }
        _ => {
            info!("Subscription webhook disabled; serving health check only");
            health_router(settings)
        }
    };

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
    pool.close().await;
    info!("VPN shop stopped");
    Ok(())
}

/// Shared dependencies the orchestrator and the background loops both use.
struct Collaborators {
    purchases: Arc<dyn PurchaseRepository>,
    customers: Arc<dyn CustomerRepository>,
    chat: Arc<TelegramBotClient>,
    catalog: Arc<FileMessageCatalog>,
}

fn build_orchestrator(
    config: &AppConfig,
    pool: &PgPool,
    deps: Collaborators,
) -> Result<PaymentOrchestrator, StartupError> {
    let panel = &config.panel;
    let provisioner = PanelClient::new(
        vpn_shop::adapters::PanelConfig::new(&panel.url, panel.token.expose_secret().as_str())
            .with_local_mode(panel.is_local())
            .with_inbounds(panel.inbounds()?)
            .with_timeout(std::time::Duration::from_secs(panel.timeout_secs)),
    )?;

    let plans = &config.plans;
    let settings = OrchestratorSettings {
        traffic_limit_bytes: plans.traffic_limit_bytes(),
        trial_days: plans.trial_days,
        trial_traffic_limit_bytes: plans.trial_traffic_limit_bytes(),
        referral_bonus_days: plans.referral_days,
    };

    let mut orchestrator = PaymentOrchestrator::new(
        deps.purchases,
        deps.customers,
        Arc::new(PostgresReferralRepository::new(pool.clone())),
        Arc::new(provisioner),
        deps.chat.clone(),
        deps.catalog,
        settings,
    );

    let payment = &config.payment;
    if payment.crypto.enabled {
        orchestrator = orchestrator.with_backend(Arc::new(crypto_client(config)?));
    }
    if payment.gateway.enabled {
        orchestrator = orchestrator.with_backend(Arc::new(gateway_client(config)?));
    }
    if payment.stars.enabled {
        orchestrator = orchestrator.with_backend(deps.chat);
    }
    if payment.subscription_webhook.enabled {
        orchestrator = orchestrator.with_backend(Arc::new(SubscriptionLinkBackend::new(
            &payment.subscription_webhook.payment_url,
        )));
    }
    Ok(orchestrator)
}

/// One lookup per polled backend that is switched on.
fn build_lookups(config: &AppConfig) -> Result<Vec<Arc<dyn InvoiceLookup>>, StartupError> {
    let mut lookups: Vec<Arc<dyn InvoiceLookup>> = Vec::new();
    if config.payment.crypto.enabled {
        lookups.push(Arc::new(crypto_client(config)?));
    }
    if config.payment.gateway.enabled {
        lookups.push(Arc::new(gateway_client(config)?));
    }
    Ok(lookups)
}

fn crypto_client(config: &AppConfig) -> Result<CryptoPayClient, StartupError> {
    let crypto = &config.payment.crypto;
    let token = crypto
        .token
        .as_ref()
        .map(|t| t.expose_secret().clone())
        .ok_or(config::ValidationError::MissingRequired("PAYMENT__CRYPTO__TOKEN"))?;
    let client = CryptoPayClient::new(
        CryptoPayConfig::new(token, &config.telegram.bot_url).with_base_url(&crypto.url),
    )?;
    Ok(client)
}

fn gateway_client(config: &AppConfig) -> Result<GatewayClient, StartupError> {
    let gateway = &config.payment.gateway;
    let secret_key = gateway
        .secret_key
        .as_ref()
        .map(|k| k.expose_secret().clone())
        .ok_or(config::ValidationError::MissingRequired("PAYMENT__GATEWAY__SECRET_KEY"))?;

    let mut client_config =
        GatewayConfig::new(&gateway.shop_id, secret_key, &config.telegram.bot_url)
            .with_base_url(&gateway.url);
    if let Some(email) = &gateway.receipt_email {
        client_config = client_config.with_receipt_email(email);
    }
    Ok(GatewayClient::new(client_config)?)
}

fn chat_client(config: &AppConfig) -> Result<TelegramBotClient, StartupError> {
    let token = config.telegram.token.expose_secret().clone();
    Ok(TelegramBotClient::new(TelegramConfig::new(token))?)
}

fn build_catalog(config: &AppConfig) -> Result<FileMessageCatalog, StartupError> {
    let language = &config.telegram.default_language;
    match &config.telegram.translations_dir {
        Some(dir) => Ok(FileMessageCatalog::load(dir, language.as_str())?),
        None => Ok(FileMessageCatalog::built_in(language.as_str())),
    }
}

/// Waits for Ctrl-C, then tells every background loop to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
}
