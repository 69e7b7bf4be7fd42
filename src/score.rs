//! Score bookkeeping
//!
//! Each obstacle pays out once. The best total is kept in LocalStorage.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::sim::ObstacleId;

/// Score collaborator used by the session
pub trait ScoreService {
    /// Award `points` for obstacle `id`; returns false if it already paid out
    fn add(&mut self, id: ObstacleId, points: u32) -> bool;

    /// Forget everything scored so far
    fn reset(&mut self);

    /// Drop bookkeeping for obstacles no longer alive
    fn retain(&mut self, live: &[ObstacleId]);

    fn total(&self) -> u64;
}

/// Default in-memory score board
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoreBoard {
    #[serde(skip)]
    scored: HashSet<ObstacleId>,
    #[serde(skip)]
    total: u64,
    /// Highest total seen
    pub best: u64,
}

impl ScoreBoard {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "glass_tones_best";

    pub fn new() -> Self {
        Self::default()
    }

    /// Load the best score from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(board) = serde_json::from_str::<ScoreBoard>(&json) {
                    log::info!("Loaded best score {}", board.best);
                    return board;
                }
            }
        }
        Self::new()
    }

    /// Save the best score to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {}

    pub fn is_scored(&self, id: ObstacleId) -> bool {
        self.scored.contains(&id)
    }
}

impl ScoreService for ScoreBoard {
    fn add(&mut self, id: ObstacleId, points: u32) -> bool {
        if !self.scored.insert(id) {
            return false;
        }
        self.total += points as u64;
        self.best = self.best.max(self.total);
        true
    }

    fn reset(&mut self) {
        self.scored.clear();
        self.total = 0;
    }

    fn retain(&mut self, live: &[ObstacleId]) {
        self.scored.retain(|id| live.contains(id));
    }

    fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_obstacle_scores_once() {
        let mut board = ScoreBoard::new();
        assert!(board.add(ObstacleId(1), 10));
        assert!(!board.add(ObstacleId(1), 20));
        assert!(board.add(ObstacleId(2), 15));
        assert_eq!(board.total(), 25);
        assert_eq!(board.best, 25);
    }

    #[test]
    fn test_reset_keeps_best() {
        let mut board = ScoreBoard::new();
        board.add(ObstacleId(1), 40);
        board.reset();
        assert_eq!(board.total(), 0);
        assert_eq!(board.best, 40);
        assert!(board.add(ObstacleId(1), 10));
    }

    #[test]
    fn test_retain_drops_expired() {
        let mut board = ScoreBoard::new();
        board.add(ObstacleId(1), 10);
        board.add(ObstacleId(2), 10);
        board.retain(&[ObstacleId(2)]);
        assert!(!board.is_scored(ObstacleId(1)));
        assert!(board.is_scored(ObstacleId(2)));
        assert_eq!(board.total(), 20);
    }

    #[test]
    fn test_best_roundtrips_as_json() {
        let mut board = ScoreBoard::new();
        board.add(ObstacleId(3), 30);
        let json = serde_json::to_string(&board).unwrap();
        let back: ScoreBoard = serde_json::from_str(&json).unwrap();
        assert_eq!(back.best, 30);
        assert_eq!(back.total(), 0);
    }
}
