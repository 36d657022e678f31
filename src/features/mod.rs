//! Derived per-game features
//!
//! Fantasy scoring, opponent encoding and the game log derivation that
//! combines them.

pub mod encoding;
pub mod fantasy;
pub mod game_log;

pub use encoding::OpponentEncoder;
pub use fantasy::{fantasy_score, StatLine};
pub use game_log::{derive_game_log, DeriveContext, GameLogRecord};
