//! Contracts for the external level and hint services, plus the offline
//! fallbacks used whenever those services are missing or fail.

use crate::{GRID_SIZE, level::LevelData};

/// Shown when no hint service is configured.
pub const DEFAULT_HINT: &str = "Coba periksa langkahmu satu per satu. Kamu pasti bisa!";
/// Shown when the hint service fails.
pub const RECOVERY_HINT: &str = "Tetap semangat! Coba telusuri jalan robotnya lagi.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("No external service is configured")]
    Unavailable,
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Could not parse service response: {0}")]
    Parse(String),
}

/// Produces new levels. Implementations may block; callers that must stay
/// responsive run them off the render loop.
pub trait LevelSource: Send + Sync {
    fn generate_level(&self, difficulty: &str, level_number: u32) -> Result<LevelData, SourceError>;
}

/// Produces a short, player-facing nudge for the current layout and program.
pub trait HintSource: Send + Sync {
    fn hint(&self, layout: &[String], commands: &[String]) -> Result<String, SourceError>;
}

/// A source that is never available. Every request falls back.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSource;

impl LevelSource for OfflineSource {
    fn generate_level(&self, _difficulty: &str, _level_number: u32) -> Result<LevelData, SourceError> {
        Err(SourceError::Unavailable)
    }
}

impl HintSource for OfflineSource {
    fn hint(&self, _layout: &[String], _commands: &[String]) -> Result<String, SourceError> {
        Err(SourceError::Unavailable)
    }
}

/// The predefined levels. Always well-formed.
pub fn fallback_levels() -> Vec<LevelData> {
    vec![
        LevelData {
            id: 1,
            grid_size: GRID_SIZE,
            layout: rows(&["S....", ".XXX.", "....C", ".XXX.", "....G"]),
            story: "Selamat datang, Kadet! Robot kita, Robo, perlu mencapai pangkalan (G) untuk \
                    mengisi daya. Hati-hati dengan batu meteor (X) dan ambil koin (C)!"
                .to_string(),
            difficulty: "Easy".to_string(),
            par: 8,
        },
        LevelData {
            id: 2,
            grid_size: GRID_SIZE,
            layout: rows(&["S.X..", "..X.C", ".X..X", "C...X", ".X.G."]),
            story: "Misi kedua: Jalur asteroid! Gunakan logikamu untuk menemukan jalan teraman."
                .to_string(),
            difficulty: "Medium".to_string(),
            par: 10,
        },
    ]
}

/// The fallback level for `level_number`, cycling through the table and
/// renumbered to the requested id.
pub fn fallback_level(level_number: u32) -> LevelData {
    let mut table = fallback_levels();
    let index = (level_number.max(1) as usize - 1) % table.len();
    let mut level = table.swap_remove(index);
    level.id = level_number;
    level
}

fn rows(layout: &[&str]) -> Vec<String> {
    layout.iter().map(|r| r.to_string()).collect()
}
