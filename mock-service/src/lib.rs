//! In-process stand-in for the ledger API, used to exercise the load generator.
use axum::{
    debug_handler,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Route {
    Charge,
    Withdraw,
    Balance,
    Transactions,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Base latency of every ledger route.
    pub delay: Duration,
    /// Standard deviation of the latency, if any.
    pub jitter: Option<Duration>,
    /// Routes answering with a fixed status instead of succeeding.
    pub failures: HashMap<Route, u16>,
    /// Status of a successful withdrawal; 202 emulates asynchronous settlement.
    pub withdraw_status: u16,
    /// Capacity beyond which requests are rejected with 503.
    pub max_tps: Option<NonZeroU32>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            jitter: None,
            failures: HashMap::new(),
            withdraw_status: 200,
            max_tps: None,
        }
    }
}

impl MockConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, route: Route, status: u16) -> Self {
        self.failures.insert(route, status);
        self
    }
}

/// What the mock observed, for assertions.
#[derive(Debug, Default, Clone)]
pub struct MockStats {
    pub requests: HashMap<Route, u64>,
    pub duplicate_keys: u64,
    pub unique_keys: usize,
    pub rejected: u64,
    pub pages: BTreeSet<(u32, u32)>,
    pub user_ids: BTreeSet<u32>,
}

#[derive(Clone)]
struct AppState {
    config: Arc<MockConfig>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    keys: Arc<Mutex<HashSet<String>>>,
    stats: Arc<Mutex<MockStats>>,
    health_hits: Arc<AtomicU64>,
}

/// A running mock bound to an ephemeral local port.
pub struct MockLedger {
    pub addr: SocketAddr,
    state: AppState,
}

impl MockLedger {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stats(&self) -> MockStats {
        let mut stats = lock(&self.state.stats).clone();
        stats.unique_keys = lock(&self.state.keys).len();
        stats
    }

    pub fn health_hits(&self) -> u64 {
        self.state.health_hits.load(Ordering::Relaxed)
    }
}

/// Bind `127.0.0.1:0` and serve in the background.
pub async fn spawn(config: MockConfig) -> anyhow::Result<MockLedger> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = AppState::new(config);
    let app = router(state.clone());
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock ledger stopped: {err}");
        }
    });
    Ok(MockLedger { addr, state })
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(AppState::new(config))).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/charge", post(charge))
        .route("/withdraw", post(withdraw))
        .route("/balance", get(balance))
        .route("/transactions", get(transactions))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl AppState {
    fn new(config: MockConfig) -> Self {
        Self {
            limiter: config.max_tps.map(|tps| Arc::new(rate_limiter(tps))),
            config: Arc::new(config),
            keys: Arc::new(Mutex::new(HashSet::new())),
            stats: Arc::new(Mutex::new(MockStats::default())),
            health_hits: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Common prologue: count, delay, capacity and forced failures.
    async fn enter(&self, route: Route) -> Result<(), StatusCode> {
        *lock(&self.stats).requests.entry(route).or_default() += 1;
        tokio::time::sleep(self.latency()).await;

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
        }

        match self.config.failures.get(&route) {
            Some(status) => Err(status_code(*status)),
            None => Ok(()),
        }
    }

    fn latency(&self) -> Duration {
        let Some(jitter) = self.config.jitter else {
            return self.config.delay;
        };
        match Normal::new(self.config.delay.as_secs_f64(), jitter.as_secs_f64()) {
            Ok(normal) => Duration::from_secs_f64(normal.sample(&mut rand::thread_rng()).max(0.)),
            Err(_) => self.config.delay,
        }
    }

    fn reject(&self, reason: &str) -> StatusCode {
        debug!("MOCK LEDGER ___ REJECT {reason}");
        lock(&self.stats).rejected += 1;
        StatusCode::UNPROCESSABLE_ENTITY
    }

    fn claim_key(&self, key: &str) -> Result<(), StatusCode> {
        if lock(&self.keys).insert(key.to_string()) {
            Ok(())
        } else {
            lock(&self.stats).duplicate_keys += 1;
            Err(StatusCode::CONFLICT)
        }
    }

    fn saw_user(&self, user_id: i64) -> Result<(), StatusCode> {
        if user_id <= 0 {
            return Err(self.reject("user_id"));
        }
        lock(&self.stats).user_ids.insert(user_id as u32);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub user_id: i64,
    pub amount: i64,
    pub idempotency_key: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub release_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub user_id: i64,
    pub amount: i64,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub user_id: i64,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct KeyResponse {
    pub message: &'static str,
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub total: i64,
    pub withdrawable: i64,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<()>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

const RELEASE_SLACK: time::Duration = time::Duration::minutes(1);

#[debug_handler]
async fn charge(
    State(state): State<AppState>,
    Json(req): Json<ChargeRequest>,
) -> Result<Json<KeyResponse>, StatusCode> {
    state.enter(Route::Charge).await?;

    if req.idempotency_key.is_empty() {
        return Err(state.reject("idempotency_key"));
    }
    if req.amount <= 0 {
        return Err(state.reject("amount"));
    }
    if let Some(release_at) = req.release_at {
        let now = OffsetDateTime::now_utc();
        if release_at < now - RELEASE_SLACK || release_at > now + time::Duration::hours(3) + RELEASE_SLACK {
            return Err(state.reject("release_at"));
        }
    }
    state.saw_user(req.user_id)?;
    state.claim_key(&req.idempotency_key)?;

    Ok(Json(KeyResponse {
        message: "charged",
        idempotency_key: req.idempotency_key,
    }))
}

#[debug_handler]
async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<KeyResponse>), StatusCode> {
    state.enter(Route::Withdraw).await?;

    if req.amount <= 0 {
        return Err(state.reject("amount"));
    }
    state.saw_user(req.user_id)?;
    if req.idempotency_key.is_empty() {
        return Err(state.reject("idempotency_key"));
    }
    state.claim_key(&req.idempotency_key)?;

    Ok((
        status_code(state.config.withdraw_status),
        Json(KeyResponse {
            message: "withdrawal request submitted",
            idempotency_key: req.idempotency_key,
        }),
    ))
}

#[debug_handler]
async fn balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, StatusCode> {
    state.enter(Route::Balance).await?;
    state.saw_user(query.user_id)?;
    Ok(Json(BalanceResponse {
        total: 0,
        withdrawable: 0,
    }))
}

#[debug_handler]
async fn transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, StatusCode> {
    state.enter(Route::Transactions).await?;
    state.saw_user(query.user_id)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(10);
    lock(&state.stats).pages.insert((page, limit));

    Ok(Json(TransactionsResponse {
        transactions: vec![],
        total: 0,
        page,
        limit,
    }))
}

async fn health(State(state): State<AppState>) -> &'static str {
    state.health_hits.fetch_add(1, Ordering::Relaxed);
    "ok"
}

/** Utils **/

fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
