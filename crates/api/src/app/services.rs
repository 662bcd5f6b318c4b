//! Process-wide service wiring: storage, cache, forecaster, event channel.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use smartwh_ai::{ChatCompletionConfig, ChatCompletionForecaster, ForecastModel, TrendForecaster};
use smartwh_events::EventChannel;
use smartwh_infra::cache::{Cache, InMemoryCache};
use smartwh_infra::repository::{InMemoryWarehouseStore, PostgresWarehouseStore, WarehouseStore};
use smartwh_infra::{AppConfig, DashboardService, PredictionService, ScanIngestor};
use smartwh_stream::SessionConfig;

pub struct AppServices {
    pub config: AppConfig,
    pub store: Arc<dyn WarehouseStore>,
    pub cache: Arc<dyn Cache>,
    /// The one event channel shared by producers and the dashboard stream.
    pub channel: EventChannel,
    pub ingestor: ScanIngestor,
    pub predictions: PredictionService,
    pub dashboard: DashboardService,
    /// Cancelled on process shutdown; live sessions stop with it.
    pub shutdown: CancellationToken,
}

impl AppServices {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn WarehouseStore>,
        cache: Arc<dyn Cache>,
        model: Arc<dyn ForecastModel>,
    ) -> Self {
        let channel = EventChannel::new(config.event_channel_capacity);

        let ingestor = ScanIngestor::new(
            store.clone(),
            cache.clone(),
            channel.clone(),
            config.robot_status_ttl,
        );
        let predictions = PredictionService::new(
            store.clone(),
            model,
            cache.clone(),
            channel.clone(),
            config.ai_cache_ttl,
        );
        let dashboard = DashboardService::new(store.clone(), cache.clone(), config.dashboard_cache_ttl);

        Self {
            config,
            store,
            cache,
            channel,
            ingestor,
            predictions,
            dashboard,
            shutdown: CancellationToken::new(),
        }
    }

    /// In-memory store with demo fixtures, in-memory cache, local trend model.
    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        let store = InMemoryWarehouseStore::with_demo_fixtures()
            .context("failed to seed in-memory store")?;
        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(InMemoryCache::new()),
            Arc::new(TrendForecaster::new()),
        ))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ping_interval: self.config.stream_ping_interval,
            write_timeout: self.config.stream_write_timeout,
        }
    }
}

pub async fn build_services(config: AppConfig) -> anyhow::Result<AppServices> {
    let store = build_store(&config).await?;
    let cache = build_cache(&config).await?;
    let model = build_model(&config)?;

    tracing::info!(
        model = model.name(),
        channel_capacity = config.event_channel_capacity.get(),
        "services initialized"
    );

    Ok(AppServices::new(config, store, cache, model))
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WarehouseStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory store with demo fixtures");
        let store = InMemoryWarehouseStore::with_demo_fixtures()
            .context("failed to seed in-memory store")?;
        return Ok(Arc::new(store));
    };

    let store = PostgresWarehouseStore::connect(url)
        .await
        .context("failed to connect to postgres")?;
    store.migrate().await.context("failed to apply schema")?;
    store
        .seed_demo_fixtures()
        .await
        .context("failed to seed demo fixtures")?;
    Ok(Arc::new(store))
}

#[cfg(feature = "redis")]
async fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let cache = smartwh_infra::cache::RedisCache::connect(url)
                .await
                .context("failed to connect to redis")?;
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(InMemoryCache::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but built without the `redis` feature; using in-memory cache");
    }
    Ok(Arc::new(InMemoryCache::new()))
}

fn build_model(config: &AppConfig) -> anyhow::Result<Arc<dyn ForecastModel>> {
    let Some(api) = &config.ai_api else {
        return Ok(Arc::new(TrendForecaster::new()));
    };

    let mut chat = ChatCompletionConfig::new(&api.url, &api.key);
    if let Some(model) = &api.model {
        chat = chat.with_model(model);
    }
    let forecaster =
        ChatCompletionForecaster::new(chat).context("failed to build chat-completions client")?;
    Ok(Arc::new(forecaster))
}
