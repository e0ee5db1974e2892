//! Application assembly: build the store, repositories, services, and
//! background tasks from configuration, then serve the HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{self, AppContext};
use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::notify::{NotificationHub, Reconciler};
use crate::repository::{HistoryRepository, OrderRepository, ValidatorRepository};
use crate::service::lifecycle::OrderLifecycle;
use crate::service::quorum::ValidationQuorum;
use crate::service::rate::{HttpPriceOracle, RateLockService};
use crate::service::risk::FraudRiskEngine;
use crate::service::scheduler::Scheduler;
use crate::store::{FallbackStore, KeyedStore, MemoryStore, RestStore};

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEADLINE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);
const LOCK_RELEASE_INTERVAL: Duration = Duration::from_secs(3_600);
const HOURLY_RESET_INTERVAL: Duration = Duration::from_secs(3_600);
const DAILY_RESET_INTERVAL: Duration = Duration::from_secs(86_400);

pub struct App;

impl App {
    /// Wire everything and serve until the listener fails.
    pub async fn run(config: Config) -> Result<()> {
        let store = build_store(&config);

        let orders = Arc::new(OrderRepository::new(Arc::clone(&store)));
        let validators = Arc::new(ValidatorRepository::new(Arc::clone(&store)));
        let history = Arc::new(HistoryRepository::new(Arc::clone(&store)));

        let hub = Arc::new(NotificationHub::new(config.server.connection_buffer));
        let risk = Arc::new(FraudRiskEngine::new(config.risk.clone()));
        let oracle = Arc::new(HttpPriceOracle::new(
            config.quote.oracle_url.clone(),
            config.quote.fiat_currency.clone(),
        ));
        let rates = Arc::new(RateLockService::new(oracle, config.quote.clone()));

        let lifecycle = Arc::new(OrderLifecycle::new(
            Arc::clone(&orders),
            Arc::clone(&history),
            Arc::clone(&risk),
            Arc::clone(&rates),
            Arc::clone(&hub),
            config.quote.clone(),
            &config.quorum,
        ));
        let quorum = Arc::new(ValidationQuorum::new(
            validators,
            Arc::clone(&lifecycle),
            config.quorum.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&orders),
            Arc::clone(&hub),
            config.server.snapshot_limit,
        ));

        let handles = spawn_background_tasks(
            Arc::clone(&lifecycle),
            Arc::clone(&quorum),
            Arc::clone(&risk),
            Arc::clone(&history),
            reconciler,
        );

        let ctx = AppContext {
            lifecycle,
            quorum,
            risk,
            orders,
            history,
            hub,
            server: config.server.clone(),
        };

        let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
        info!(addr = %config.server.bind_addr, "listening");
        let result = axum::serve(listener, api::router(ctx)).await;

        for handle in handles {
            handle.abort();
        }
        result.map_err(Into::into)
    }
}

fn build_store(config: &Config) -> Arc<dyn KeyedStore> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("using in-process keyed store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Rest => {
            // validate() already required url and token for this backend.
            let url = config.store.url.clone().unwrap_or_default();
            let token = config.store.token.clone().unwrap_or_default();
            info!(url = %url, "using replicated keyed store with in-process fallback");
            Arc::new(FallbackStore::new(Arc::new(RestStore::new(url, token))))
        }
    }
}

fn spawn_background_tasks(
    lifecycle: Arc<OrderLifecycle>,
    quorum: Arc<ValidationQuorum>,
    risk: Arc<FraudRiskEngine>,
    history: Arc<HistoryRepository>,
    reconciler: Arc<Reconciler>,
) -> Vec<JoinHandle<()>> {
    let mut scheduler = Scheduler::new();

    scheduler.register("order-expiry-sweep", EXPIRY_SWEEP_INTERVAL, {
        let lifecycle = Arc::clone(&lifecycle);
        move || {
            let lifecycle = Arc::clone(&lifecycle);
            async move {
                lifecycle.expire_stale_orders(Utc::now()).await?;
                Ok(())
            }
        }
    });

    scheduler.register("validation-deadline-sweep", DEADLINE_SWEEP_INTERVAL, {
        let quorum = Arc::clone(&quorum);
        move || {
            let quorum = Arc::clone(&quorum);
            async move {
                quorum.sweep_deadlines(Utc::now()).await?;
                Ok(())
            }
        }
    });

    scheduler.register("stake-lock-release", LOCK_RELEASE_INTERVAL, {
        let quorum = Arc::clone(&quorum);
        move || {
            let quorum = Arc::clone(&quorum);
            async move {
                quorum.release_expired_locks(Utc::now()).await?;
                Ok(())
            }
        }
    });

    scheduler.register("reconcile-announcements", RECONCILE_INTERVAL, {
        let reconciler = Arc::clone(&reconciler);
        move || {
            let reconciler = Arc::clone(&reconciler);
            async move {
                reconciler.run_once().await?;
                Ok(())
            }
        }
    });

    scheduler.register("hourly-velocity-reset", HOURLY_RESET_INTERVAL, {
        let risk = Arc::clone(&risk);
        let history = Arc::clone(&history);
        move || reset_counters(Arc::clone(&risk), Arc::clone(&history), false)
    });

    scheduler.register("daily-velocity-reset", DAILY_RESET_INTERVAL, {
        let risk = Arc::clone(&risk);
        let history = Arc::clone(&history);
        move || reset_counters(Arc::clone(&risk), Arc::clone(&history), true)
    });

    scheduler.spawn()
}

/// Reset per-hour (and optionally per-day) counters for every tracked
/// wallet. Stale-write conflicts are skipped; the next run catches them.
async fn reset_counters(
    risk: Arc<FraudRiskEngine>,
    history: Arc<HistoryRepository>,
    daily: bool,
) -> Result<()> {
    for mut record in history.all().await? {
        if daily {
            risk.reset_daily(&mut record);
        } else {
            risk.reset_hourly(&mut record);
        }
        if let Err(error) = history.update(&mut record).await {
            if !matches!(error, crate::error::Error::Conflict { .. }) {
                return Err(error);
            }
        }
    }
    Ok(())
}
