use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// 5x5 board.
pub const GRID_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Completed,
    Lost,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Active => "active",
            GameStatus::Completed => "completed",
            GameStatus::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(GameStatus::Active),
            "completed" => Some(GameStatus::Completed),
            "lost" => Some(GameStatus::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    Hidden,
    RevealedSafe,
    RevealedMine,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tile {
    pub position: u8,
    pub status: TileStatus,
    pub is_mine: bool,
}

/// What a single reveal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    Safe,
    Mine,
    AlreadyRevealed,
}

/// Full board state reconstructed from mine positions and reveal history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grid {
    pub tiles: Vec<Tile>,
}

impl Grid {
    pub fn with_mines(mine_positions: &[u8]) -> Self {
        let tiles = (0..GRID_SIZE as u8)
            .map(|position| Tile {
                position,
                status: TileStatus::Hidden,
                is_mine: mine_positions.contains(&position),
            })
            .collect();
        Self { tiles }
    }

    pub fn mine_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_mine).count()
    }

    pub fn revealed_safe_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.status == TileStatus::RevealedSafe)
            .count()
    }

    pub fn all_safe_revealed(&self) -> bool {
        self.revealed_safe_count() == GRID_SIZE - self.mine_count()
    }

    pub fn reveal(&mut self, position: u8) -> Result<Reveal> {
        let tile = self
            .tiles
            .get_mut(usize::from(position))
            .ok_or(EngineError::PositionOutOfRange(position))?;
        if tile.status != TileStatus::Hidden {
            return Ok(Reveal::AlreadyRevealed);
        }
        if tile.is_mine {
            tile.status = TileStatus::RevealedMine;
            Ok(Reveal::Mine)
        } else {
            tile.status = TileStatus::RevealedSafe;
            Ok(Reveal::Safe)
        }
    }

    /// View safe for disclosure while the game is running: hidden tiles do
    /// not betray whether they hold a mine.
    pub fn sanitized(&self) -> Self {
        let tiles = self
            .tiles
            .iter()
            .map(|t| Tile {
                position: t.position,
                status: t.status,
                is_mine: if t.status == TileStatus::Hidden { false } else { t.is_mine },
            })
            .collect();
        Self { tiles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_construction() {
        let grid = Grid::with_mines(&[0, 7, 24]);
        assert_eq!(grid.tiles.len(), GRID_SIZE);
        assert_eq!(grid.mine_count(), 3);
        assert!(grid.tiles[7].is_mine);
        assert!(!grid.tiles[8].is_mine);
    }

    #[test]
    fn test_reveal_transitions() {
        let mut grid = Grid::with_mines(&[0]);
        assert_eq!(grid.reveal(1).unwrap(), Reveal::Safe);
        assert_eq!(grid.reveal(1).unwrap(), Reveal::AlreadyRevealed);
        assert_eq!(grid.reveal(0).unwrap(), Reveal::Mine);
        assert_eq!(grid.reveal(25), Err(EngineError::PositionOutOfRange(25)));
        assert_eq!(grid.revealed_safe_count(), 1);
    }

    #[test]
    fn test_win_detection() {
        let mut grid = Grid::with_mines(&[24]);
        for position in 0..24 {
            assert_eq!(grid.reveal(position).unwrap(), Reveal::Safe);
        }
        assert!(grid.all_safe_revealed());
    }

    #[test]
    fn test_sanitized_hides_unrevealed_mines() {
        let mut grid = Grid::with_mines(&[0, 1]);
        grid.reveal(0).unwrap();
        let safe = grid.sanitized();
        assert!(safe.tiles[0].is_mine, "a revealed mine stays visible");
        assert!(!safe.tiles[1].is_mine, "a hidden mine must not leak");
    }
}
