//! Wire models for the directory API
//!
//! Only the fields the pipeline reads are modelled; everything else in the
//! payloads is ignored. Optional fields default so partial payloads decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strip the leading `#` and uppercase
pub fn canonical_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_uppercase()
}

/// `{"items": [...]}` envelope used by list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Clan search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanSummary {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    /// Member count
    #[serde(rename = "members", default)]
    pub member_count: u32,
}

/// Clan roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanMember {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Card icon URLs by size
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconUrls {
    pub medium: Option<String>,
    pub evolution_medium: Option<String>,
    pub evolution_small: Option<String>,
    pub large: Option<String>,
    pub small: Option<String>,
}

impl IconUrls {
    /// Preferred icon for display
    pub fn best(&self) -> Option<&str> {
        [
            &self.medium,
            &self.evolution_medium,
            &self.evolution_small,
            &self.large,
            &self.small,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|url| !url.is_empty())
    }
}

/// A card as it appears in decks and battle records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    /// Numeric (or string) card id
    #[serde(default)]
    pub id: Option<Value>,
    /// Alternate key some payloads carry instead of an id
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default, alias = "elixir")]
    pub elixir_cost: Option<f32>,
    #[serde(default)]
    pub icon_urls: IconUrls,
}

impl CardRef {
    /// Identity used for deck comparison: id, else key, else name; lowercased
    pub fn card_key(&self) -> Option<String> {
        let id = match &self.id {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        id.or_else(|| self.key.clone().filter(|k| !k.is_empty()))
            .or_else(|| self.name.clone().filter(|n| !n.is_empty()))
            .map(|k| k.to_lowercase())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("?")
    }
}

/// Clan reference inside a player profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerClan {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
}

/// Player profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trophies: u32,
    #[serde(default)]
    pub best_trophies: Option<u32>,
    #[serde(default)]
    pub exp_level: u32,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub clan: Option<PlayerClan>,
    #[serde(default)]
    pub current_deck: Vec<CardRef>,
    #[serde(default)]
    pub current_favourite_card: Option<CardRef>,
}

/// Game mode descriptor of a battle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMode {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
}

/// One side's participant in a battle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub crowns: u32,
    #[serde(default)]
    pub cards: Vec<CardRef>,
}

/// Battle log entry, most recent first in the log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRecord {
    #[serde(rename = "type", default)]
    pub battle_type: String,
    #[serde(default)]
    pub battle_time: Option<String>,
    #[serde(default)]
    pub game_mode: Option<GameMode>,
    #[serde(default)]
    pub deck_selection: Option<String>,
    #[serde(default)]
    pub is_friendly: bool,
    #[serde(default)]
    pub challenge_id: Option<u64>,
    #[serde(default)]
    pub challenge_title: Option<String>,
    #[serde(default)]
    pub team: Vec<Participant>,
    #[serde(default)]
    pub opponent: Vec<Participant>,
}

impl BattleRecord {
    /// Game mode name, empty when absent
    pub fn mode(&self) -> &str {
        self.game_mode.as_ref().map(|m| m.name.as_str()).unwrap_or("")
    }

    pub fn is_challenge(&self) -> bool {
        self.challenge_id.is_some_and(|id| id != 0)
            || self.challenge_title.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Cards played by `player_tag` on whichever side they were
    pub fn cards_of(&self, player_tag: &str) -> Option<&[CardRef]> {
        let wanted = canonical_tag(player_tag);
        self.team
            .iter()
            .chain(self.opponent.iter())
            .find(|p| canonical_tag(&p.tag) == wanted)
            .map(|p| p.cards.as_slice())
            .filter(|cards| !cards.is_empty())
    }
}
