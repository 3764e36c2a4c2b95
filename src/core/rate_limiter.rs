use crate::utils::error::{GameError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

/// Token bucket：每個 tick 重新填滿到 `capacity`，令牌不足時依 FIFO 排隊
pub struct TokenBucket {
    capacity: u32,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: u32,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl TokenBucket {
    /// 建立並啟動補充任務；需在 tokio runtime 內呼叫。
    /// 補充任務只持有 Weak 參照，bucket 釋放後即結束。
    pub fn start(capacity: u32, tick: Duration) -> Arc<Self> {
        let capacity = capacity.max(1);
        let bucket = Arc::new(Self {
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                waiters: VecDeque::new(),
            }),
        });

        let weak = Arc::downgrade(&bucket);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一個 tick 立即完成
            interval.tick().await;
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(bucket) => bucket.refill(),
                    None => break,
                }
            }
        });

        bucket
    }

    #[cfg(test)]
    fn available(&self) -> u32 {
        self.lock().tokens
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// 取得一個令牌；bucket 已空時等到下一次補充
    pub async fn acquire(&self) -> Result<()> {
        let receiver = {
            let mut state = self.lock();
            if state.tokens > 0 && state.waiters.is_empty() {
                state.tokens -= 1;
                return Ok(());
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };

        tracing::trace!("Rate limit reached, request queued");
        receiver.await.map_err(|_| GameError::RateLimiterClosed)
    }

    fn refill(&self) {
        let mut state = self.lock();
        state.tokens = self.capacity;
        while state.tokens > 0 {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            // 已取消的呼叫者不消耗令牌
            if waiter.send(()).is_ok() {
                state.tokens -= 1;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
