use crate::domain::model::LeaderboardEntry;
use crate::domain::ports::LeaderboardStore;
use crate::utils::error::{GameError, Result};
use std::sync::Arc;

pub const MAX_NAME_LEN: usize = 24;
pub const DEFAULT_CAPACITY: usize = 10;

/// 只保留 ASCII 英數字與空白，最多 24 個字元
pub fn sanitize_name(raw: &str) -> String {
    let kept: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .take(MAX_NAME_LEN)
        .collect();
    kept.trim().to_string()
}

pub struct LeaderboardService {
    store: Arc<dyn LeaderboardStore>,
    capacity: usize,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn LeaderboardStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
        }
    }

    pub async fn submit(&self, name: &str, score: f64) -> Result<()> {
        let name = sanitize_name(name);
        if name.is_empty() {
            return Err(GameError::validation("Invalid name"));
        }
        if !score.is_finite() || score < 0.0 {
            return Err(GameError::validation("Invalid score"));
        }

        self.store.add(&name, score).await?;
        self.store.trim_to(self.capacity).await?;
        tracing::info!("🏆 Leaderboard entry for {} at {}", name, score);
        Ok(())
    }

    pub async fn top(&self) -> Result<Vec<LeaderboardEntry>> {
        self.store.top(self.capacity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::leaderboard::InMemoryLeaderboard;

    fn service() -> LeaderboardService {
        LeaderboardService::new(Arc::new(InMemoryLeaderboard::default()), DEFAULT_CAPACITY)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Ann<>!"), "Ann");
        assert_eq!(sanitize_name("  Jo  Ann  "), "Jo  Ann");
        assert_eq!(sanitize_name("Zoë"), "Zo");
        assert_eq!(sanitize_name("<script>"), "script");
        assert_eq!(sanitize_name("   "), "");

        let long = "abcdefghij".repeat(4);
        assert_eq!(sanitize_name(&long), &long[..MAX_NAME_LEN]);
        // 截斷後的尾端空白也要去掉
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvw xyz"), "abcdefghijklmnopqrstuvw");
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_input() {
        let leaderboard = service();

        for (name, score) in [
            ("   ", 100.0),
            ("!!!", 100.0),
            ("Ann", -1.0),
            ("Ann", f64::NAN),
            ("Ann", f64::INFINITY),
        ] {
            let result = leaderboard.submit(name, score).await;
            assert!(matches!(result, Err(GameError::ValidationError { .. })));
        }
        assert!(leaderboard.top().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_stores_sanitized_name() {
        let leaderboard = service();
        leaderboard.submit("Ann<>!", 4200.0).await.unwrap();

        let top = leaderboard.top().await.unwrap();
        assert_eq!(top, vec![LeaderboardEntry { name: "Ann".to_string(), score: 4200.0 }]);
    }

    #[tokio::test]
    async fn test_only_top_ten_are_kept() {
        let leaderboard = service();
        for i in 1..=11 {
            leaderboard
                .submit(&format!("Player {}", i), f64::from(i) * 100.0)
                .await
                .unwrap();
        }

        let top = leaderboard.top().await.unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].name, "Player 11");
        assert_eq!(top[9].name, "Player 2");
        assert!(top.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn test_resubmission_replaces_score() {
        let leaderboard = service();
        leaderboard.submit("Ann", 4000.0).await.unwrap();
        leaderboard.submit("Ann", 1000.0).await.unwrap();

        let top = leaderboard.top().await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].score, 1000.0);
    }
}
