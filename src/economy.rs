//! Service container wiring the ledger, games and challenges together
//!
//! The dispatch layer holds one `Economy` and calls into it; every component is
//! injected here so tests can swap the storage backend or the random source.

use crate::challenge::{Actor, ChallengeManager, SessionRegistry};
use crate::config::{ConfigLoader, EconomyConfig, StorageBackendKind};
use crate::errors::{EconomyError, EconomyResult};
use crate::games::{GameProcessor, RandomSource, RarityTable, RarityTier, RngSource};
use crate::ledger::{ClampedDebit, LedgerStore, TransactionEngine, TransferReceipt, UserId};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::storage::{JsonFileBackend, MemoryBackend, PersistenceBackend};
use std::sync::Arc;
use tracing::info;

pub struct Economy {
    config: EconomyConfig,
    metrics: Arc<EngineMetrics>,
    ledger: TransactionEngine,
    games: Arc<GameProcessor>,
    challenges: ChallengeManager,
}

impl Economy {
    /// Build an economy from a validated configuration
    pub async fn open(config: EconomyConfig) -> EconomyResult<Self> {
        EconomyBuilder::new().with_config(config).build().await
    }

    /// Throwaway economy with an in-memory ledger
    pub async fn in_memory() -> EconomyResult<Self> {
        Self::open(EconomyConfig::in_memory()).await
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn ledger(&self) -> &TransactionEngine {
        &self.ledger
    }

    pub fn games(&self) -> Arc<GameProcessor> {
        Arc::clone(&self.games)
    }

    pub fn challenges(&self) -> &ChallengeManager {
        &self.challenges
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn balance(&self, id: UserId) -> u64 {
        self.ledger.balance(id)
    }

    /// Player-to-player payment; bots can neither send nor receive coins
    pub async fn pay(&self, from: Actor, to: Actor, amount: i64) -> EconomyResult<TransferReceipt> {
        if from.is_bot || to.is_bot {
            return Err(EconomyError::BotTarget);
        }
        let receipt = self.ledger.transfer(from.id, to.id, amount).await?;
        info!("User {} paid {} coins to {}", from.id, receipt.amount, to.id);
        Ok(receipt)
    }

    /// Administrative grant
    pub async fn admin_add(&self, id: UserId, amount: i64) -> EconomyResult<u64> {
        let balance = self.ledger.credit(id, amount).await?;
        info!("Admin added {} coins to {} (balance {})", amount, id, balance);
        Ok(balance)
    }

    /// Administrative removal, clamped at zero
    pub async fn admin_remove(&self, id: UserId, amount: i64) -> EconomyResult<ClampedDebit> {
        self.ledger.force_debit_clamped(id, amount).await
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<(UserId, u64)> {
        self.ledger.leaderboard(limit)
    }

    pub fn inventory_by_rarity(&self, id: UserId) -> Vec<(RarityTier, Vec<String>)> {
        self.games.inventory(id)
    }
}

/// Builder for an `Economy` with optional overrides
#[derive(Default)]
pub struct EconomyBuilder {
    config: Option<EconomyConfig>,
    config_path: Option<String>,
    backend: Option<Arc<dyn PersistenceBackend>>,
    rng: Option<Box<dyn RandomSource>>,
}

impl EconomyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EconomyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a TOML file plus environment overrides
    pub fn with_config_path(mut self, path: String) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Override the persistence backend (useful for testing)
    pub fn with_backend(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the random source (useful for testing)
    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub async fn build(self) -> EconomyResult<Economy> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ConfigLoader::new().with_path(path).load()?,
            (None, None) => EconomyConfig::default(),
        };
        config.validate()?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => create_backend(&config),
        };

        let rarity = match &config.games.rarity {
            Some(tiers) => RarityTable::new(tiers.clone())?,
            None => RarityTable::standard().clone(),
        };
        let rng: Box<dyn RandomSource> = match self.rng {
            Some(rng) => rng,
            None => Box::new(RngSource::from_entropy()),
        };

        let metrics = Arc::new(EngineMetrics::new());
        let store = Arc::new(LedgerStore::open(backend, metrics.clone()).await?);
        let ledger = TransactionEngine::new(
            store.clone(),
            metrics.clone(),
            config.ledger.daily_reward,
            config.daily_cooldown()?,
        );
        let games = Arc::new(GameProcessor::new(
            store,
            metrics.clone(),
            &config.games,
            rarity,
            rng,
        ));
        let challenges = ChallengeManager::new(
            ledger.clone(),
            Arc::new(SessionRegistry::new()),
            config.challenge_timeout(),
        );

        info!(
            "Economy ready ({:?} storage, {}s challenge timeout)",
            config.storage.backend, config.challenge.timeout_secs
        );

        Ok(Economy {
            config,
            metrics,
            ledger,
            games,
            challenges,
        })
    }
}

fn create_backend(config: &EconomyConfig) -> Arc<dyn PersistenceBackend> {
    match config.storage.backend {
        StorageBackendKind::Json => Arc::new(JsonFileBackend::new(&config.storage.data_file)),
        StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}
