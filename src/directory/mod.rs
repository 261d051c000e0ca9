//! Remote Player Directory
//!
//! Read-only access to clans, rosters, player profiles and battle logs,
//! plus fuzzy resolution of OCR'd names onto directory entities.

pub mod client;
pub mod models;
pub mod resolver;

use crate::error::NetworkError;

pub use client::{ApiClient, ReqwestTransport};
pub use models::{BattleRecord, ClanMember, ClanSummary, Player};
pub use resolver::EntityResolver;

/// Directory queries used by the pipeline
pub trait Directory: Send + Sync {
    /// Clans whose name matches `name`, at most `limit`
    fn search_clans(&self, name: &str, limit: u32) -> Result<Vec<ClanSummary>, NetworkError>;

    /// Roster of the clan with `clan_tag`
    fn clan_members(&self, clan_tag: &str) -> Result<Vec<ClanMember>, NetworkError>;

    /// Full player profile
    fn player(&self, player_tag: &str) -> Result<Player, NetworkError>;

    /// Recent battles, most recent first
    fn battle_log(&self, player_tag: &str) -> Result<Vec<BattleRecord>, NetworkError>;
}
