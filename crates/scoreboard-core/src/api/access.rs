use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, warn};

use super::{Action, ApiError, ApiRequest, ApiResponse, DataSource, LiveSource, Method, Params};
use crate::cache::{CacheKey, CacheManager, Storage};
use crate::config::Config;
use crate::demo::DemoSource;
use crate::models::{
    Achievement, EventInfo, Notification, PointGrant, RatingEntry, Stats, Task, Team, Transaction,
};

/// Default page size for `getTransactions`.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 20;

/// How long each cached resource stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub teams_ttl: Duration,
    pub rating_ttl: Duration,
}

impl CachePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            teams_ttl: config.teams_cache_ttl(),
            rating_ttl: config.rating_cache_ttl(),
        }
    }

    pub fn ttl(&self, key: CacheKey) -> Duration {
        match key {
            CacheKey::Teams => self.teams_ttl,
            CacheKey::Rating => self.rating_ttl,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

type InflightLocks = Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>;

/// Entry point for every action against the event service.
///
/// Clones share the cache, the sources and the in-flight lock table, so a
/// clone handed to a background task coalesces with foreground reads.
/// Every invalidation bumps `cache_epoch`; a read that started before the
/// bump does not store its response.
#[derive(Clone)]
pub struct DataAccess {
    source: Arc<dyn DataSource>,
    fallback: Option<Arc<dyn DataSource>>,
    cache: CacheManager,
    policy: CachePolicy,
    inflight: InflightLocks,
    cache_epoch: Arc<AtomicU64>,
}

impl DataAccess {
    pub fn new(source: Arc<dyn DataSource>, cache: CacheManager, policy: CachePolicy) -> Self {
        Self {
            source,
            fallback: None,
            cache,
            policy,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            cache_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve failed requests from `fallback` instead of returning the error.
    pub fn with_fallback(mut self, fallback: Arc<dyn DataSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Pick the sources once: demo only in demo mode, otherwise live with an
    /// optional demo fallback.
    pub fn from_config(config: &Config, storage: Storage) -> Result<Self, ApiError> {
        let cache = CacheManager::new(storage);
        let policy = CachePolicy::from_config(config);
        let demo: Arc<dyn DataSource> = Arc::new(DemoSource::new(config.demo_delay()));

        if config.demo_mode {
            return Ok(Self::new(demo, cache, policy));
        }

        let live: Arc<dyn DataSource> = Arc::new(LiveSource::from_config(config)?);
        let access = Self::new(live, cache, policy);
        Ok(if config.demo_fallback {
            access.with_fallback(demo)
        } else {
            access
        })
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn is_demo(&self) -> bool {
        self.source.name() == "demo"
    }

    /// Serve everything from demo data from now on.
    pub fn switch_to_demo(&mut self) {
        if self.is_demo() {
            return;
        }
        let demo = self
            .fallback
            .take()
            .filter(|f| f.name() == "demo")
            .unwrap_or_else(|| Arc::new(DemoSource::default()));
        warn!(previous = self.source.name(), "Switching to demo data");
        self.source = demo;
    }

    pub fn clear_cache(&self) -> usize {
        self.cache_epoch.fetch_add(1, Ordering::SeqCst);
        match self.cache.clear_cache() {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Failed to clear cache");
                0
            }
        }
    }

    /// Health check against the primary source only. The demo fallback is
    /// never consulted, so an unreachable service reports its error.
    pub async fn health_check(&self) -> Result<ApiResponse, ApiError> {
        self.source
            .fetch(&ApiRequest::for_action(Action::HealthCheck))
            .await?
            .into_result()
    }

    /// Run `request` against the primary source, falling back to demo data
    /// on any failure when a fallback is configured.
    pub async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        request.validate()?;

        let err = match self.source.fetch(&request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        match self.fallback {
            Some(ref fallback) => {
                warn!(
                    action = %request.action,
                    source = self.source.name(),
                    error = %err,
                    "Request failed, serving {} data",
                    fallback.name()
                );
                fallback.fetch(&request).await
            }
            None => {
                error!(action = %request.action, error = %err, "Request failed");
                Err(err)
            }
        }
    }

    fn gate(&self, key: CacheKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }

    /// Cached read. Concurrent callers for the same key wait for the first
    /// one and then read its cached response.
    async fn fetch_cached(&self, key: CacheKey, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let gate = self.gate(key);
        let _guard = gate.lock().await;

        if let Some(cached) = self.cache.get_cached::<ApiResponse>(key.as_str()) {
            return Ok(cached);
        }

        let epoch = self.cache_epoch.load(Ordering::SeqCst);
        let response = self.fetch(request).await?;
        if self.cache_epoch.load(Ordering::SeqCst) != epoch {
            debug!(key = key.as_str(), "Cache invalidated during read, not storing");
        } else if response.success {
            if let Err(e) = self.cache.set_cached(key.as_str(), &response, self.policy.ttl(key)) {
                warn!(key = key.as_str(), error = %e, "Failed to cache response");
            }
        }
        Ok(response)
    }

    fn invalidate(&self, keys: &[CacheKey]) {
        self.cache_epoch.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            if let Err(e) = self.cache.invalidate(key.as_str()) {
                warn!(key = key.as_str(), error = %e, "Failed to invalidate cache entry");
            }
        }
    }

    async fn get(&self, action: Action, params: Params) -> Result<ApiResponse, ApiError> {
        self.fetch(ApiRequest::for_action(action).with_params(params))
            .await?
            .into_result()
    }

    // ---- authentication ---------------------------------------------------

    /// Returns the raw envelope so callers can show a soft `success: false`.
    pub async fn login_team(&self, code: &str) -> Result<ApiResponse, ApiError> {
        let params = Params::new().with("code", code.trim().to_uppercase());
        self.fetch(ApiRequest::for_action(Action::LoginTeam).with_params(params))
            .await
    }

    pub async fn login_admin(&self, username: &str, password: &str) -> Result<ApiResponse, ApiError> {
        let params = Params::new()
            .with("username", username)
            .with("password", password);
        self.fetch(ApiRequest::for_action(Action::LoginAdmin).with_params(params))
            .await
    }

    // ---- reads ------------------------------------------------------------

    pub async fn get_teams(&self) -> Result<Vec<Team>, ApiError> {
        self.fetch_cached(CacheKey::Teams, ApiRequest::for_action(Action::GetTeams))
            .await?
            .into_result()?
            .teams()
    }

    pub async fn get_team(&self, id_or_code: &str) -> Result<Team, ApiError> {
        let params = Params::new()
            .with("id", id_or_code)
            .with("code", id_or_code);
        self.get(Action::GetTeam, params).await?.require("team")
    }

    pub async fn get_transactions(
        &self,
        team_id: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT);
        let params = Params::new()
            .with_opt("teamId", team_id)
            .with("limit", limit as u64);
        self.get(Action::GetTransactions, params).await?.transactions()
    }

    pub async fn get_rating(&self) -> Result<Vec<RatingEntry>, ApiError> {
        self.fetch_cached(CacheKey::Rating, ApiRequest::for_action(Action::GetRating))
            .await?
            .into_result()?
            .rating()
    }

    pub async fn get_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.get(Action::GetTasks, Params::new()).await?.tasks()
    }

    pub async fn get_achievements(&self) -> Result<Vec<Achievement>, ApiError> {
        self.get(Action::GetAchievements, Params::new())
            .await?
            .achievements()
    }

    pub async fn get_notifications(
        &self,
        team_id: Option<i64>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, ApiError> {
        let params = Params::new()
            .with_opt("teamId", team_id)
            .with("unreadOnly", unread_only);
        self.get(Action::GetNotifications, params)
            .await?
            .notifications()
    }

    pub async fn get_stats(&self) -> Result<Stats, ApiError> {
        Ok(self
            .get(Action::GetStats, Params::new())
            .await?
            .stats()?
            .unwrap_or_default())
    }

    pub async fn get_event_info(&self) -> Result<EventInfo, ApiError> {
        self.get(Action::GetEventInfo, Params::new())
            .await?
            .require("event")
    }

    // ---- writes -----------------------------------------------------------

    /// Grant points. Never cached; a successful grant invalidates teams and rating.
    pub async fn add_points(&self, grant: &PointGrant) -> Result<ApiResponse, ApiError> {
        let body = serde_json::to_value(grant)
            .map_err(|e| ApiError::InvalidRequest(format!("Unserializable point grant: {}", e)))?;
        let request = ApiRequest::for_action(Action::AddPoints)
            .with_method(Method::Post)
            .with_body(body);

        let response = self.fetch(request).await?;
        if response.success {
            debug!(team_id = grant.team_id, points = grant.points, "Points granted");
            self.invalidate(&[CacheKey::Teams, CacheKey::Rating]);
        }
        Ok(response)
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::for_action(Action::MarkNotificationRead)
            .with_method(Method::Post)
            .with_params(Params::new().with("id", Value::from(id)));
        self.fetch(request).await?.into_result()
    }
}
