use crate::utils::error::{GameError, Result};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// 連續失敗達門檻後，冷卻期間內直接拒絕呼叫上游
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    trial_started: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown: cooldown.min(MAX_COOLDOWN),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// 永不開啟的斷路器
    pub fn disabled() -> Self {
        Self::new(u32::MAX, Duration::ZERO)
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.lock();
        match (inner.open_until, inner.trial_started) {
            (Some(until), _) if Instant::now() < until => BreakerState::Open,
            (Some(_), _) | (None, Some(_)) => BreakerState::HalfOpen,
            (None, None) => BreakerState::Closed,
        }
    }

    /// 呼叫上游前檢查；開啟中則快速失敗
    pub fn check(&self) -> Result<()> {
        let mut inner = self.lock();
        let now = Instant::now();

        if let Some(until) = inner.open_until {
            if now < until {
                return Err(GameError::CircuitOpen {
                    retry_after_ms: (until - now).as_millis() as u64,
                });
            }
            // 冷卻結束：放行一次試探呼叫
            inner.open_until = None;
            inner.trial_started = Some(now);
            tracing::info!("Circuit breaker half-open, allowing trial request");
            return Ok(());
        }

        if let Some(started) = inner.trial_started {
            // 試探呼叫沒有回報結果 (例如被取消) 超過冷卻時間，再放行一次
            let deadline = started + self.cooldown;
            if now < deadline {
                return Err(GameError::CircuitOpen {
                    retry_after_ms: (deadline - now).as_millis() as u64,
                });
            }
            inner.trial_started = Some(now);
        }
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.trial_started.is_some() {
            tracing::info!("Circuit breaker closed after successful trial request");
        }
        *inner = Inner::default();
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.trial_started.is_some() || inner.consecutive_failures >= self.failure_threshold {
            inner.open_until = Some(Instant::now() + self.cooldown);
            inner.trial_started = None;
            tracing::warn!(
                "⚡ Circuit breaker open after {} consecutive failures, cooling down for {:?}",
                inner.consecutive_failures,
                self.cooldown
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
