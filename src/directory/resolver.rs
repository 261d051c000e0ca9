//! Fuzzy entity resolution
//!
//! Maps OCR'd clan and player names onto directory entities. Clan search
//! results rank exact normalized matches first, then member count; players
//! are matched against the resolved clan's roster by normalized similarity.

use std::sync::Arc;
use strsim::normalized_levenshtein;
use tracing::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::models::{canonical_tag, ClanMember, ClanSummary};
use super::Directory;
use crate::error::NetworkError;

/// Clan search page size
pub const CLAN_SEARCH_LIMIT: u32 = 20;
/// Suggestions offered after a clan lookup
pub const CLAN_SUGGESTIONS: usize = 5;
/// Suggestions offered after a player lookup
pub const PLAYER_SUGGESTIONS: usize = 10;

/// Decompose, drop combining marks, lowercase, trim
pub fn normalize_name(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Similarity of two names after normalization, in [0, 1]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize_name(a), &normalize_name(b))
}

/// Outcome of a lookup; `tag == None` is a miss
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    pub tag: Option<String>,
    pub display_name: String,
    /// Human-readable alternatives, in result order
    pub suggestions: Vec<String>,
}

impl Resolution {
    /// A hit carrying the canonical tag; a blank tag is a miss
    pub fn hit(raw_tag: &str, display_name: &str, suggestions: Vec<String>) -> Self {
        let tag = canonical_tag(raw_tag);
        if tag.is_empty() {
            return Self::miss(suggestions);
        }
        Self {
            tag: Some(tag),
            display_name: display_name.to_string(),
            suggestions,
        }
    }

    pub fn miss(suggestions: Vec<String>) -> Self {
        Self {
            tag: None,
            display_name: String::new(),
            suggestions,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.tag.is_some()
    }
}

/// Pick the best clan among search results
///
/// Exact normalized matches form the pool when present, otherwise every
/// result does; the pool member with the most members wins, first on ties.
pub fn best_clan<'a>(query: &str, clans: &'a [ClanSummary]) -> Option<&'a ClanSummary> {
    let wanted = normalize_name(query);
    let exact: Vec<&ClanSummary> = clans
        .iter()
        .filter(|c| normalize_name(&c.name) == wanted)
        .collect();
    let pool: Vec<&ClanSummary> = if exact.is_empty() {
        clans.iter().collect()
    } else {
        exact
    };

    pool.into_iter().fold(None, |best, clan| match best {
        Some(b) if b.member_count >= clan.member_count => Some(b),
        _ => Some(clan),
    })
}

/// Pick the roster entry closest to `query`
///
/// An exact normalized match always wins; otherwise the most similar name,
/// first on ties, as long as it reaches `min_similarity`.
pub fn best_member<'a>(
    query: &str,
    members: &'a [ClanMember],
    min_similarity: f64,
) -> Option<&'a ClanMember> {
    let wanted = normalize_name(query);
    if let Some(exact) = members.iter().find(|m| normalize_name(&m.name) == wanted) {
        return Some(exact);
    }

    let mut best: Option<(&ClanMember, f64)> = None;
    for member in members {
        let score = normalized_levenshtein(&wanted, &normalize_name(&member.name));
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((member, score));
        }
    }

    best.filter(|(_, score)| *score >= min_similarity)
        .map(|(member, _)| member)
}

/// Resolves OCR'd names against the directory
pub struct EntityResolver {
    directory: Arc<dyn Directory>,
    min_player_similarity: f64,
}

impl EntityResolver {
    pub fn new(directory: Arc<dyn Directory>, min_player_similarity: f64) -> Self {
        Self {
            directory,
            min_player_similarity,
        }
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    /// Search clans by name and pick the best hit
    pub fn resolve_clan(&self, name: &str) -> Result<Resolution, NetworkError> {
        let clans = self.directory.search_clans(name, CLAN_SEARCH_LIMIT)?;
        let suggestions = clans
            .iter()
            .take(CLAN_SUGGESTIONS)
            .map(|c| format!("{} ({})", c.name, c.tag))
            .collect();

        match best_clan(name, &clans) {
            Some(clan) => {
                info!(
                    "Clan '{}' resolved to {} ({}, {} members)",
                    name, clan.name, clan.tag, clan.member_count
                );
                Ok(Resolution::hit(&clan.tag, &clan.name, suggestions))
            }
            None => {
                debug!("Clan search for '{}' returned no results", name);
                Ok(Resolution::miss(suggestions))
            }
        }
    }

    /// Match a player name against a clan roster
    pub fn resolve_player(&self, clan_tag: &str, name: &str) -> Result<Resolution, NetworkError> {
        let members = self.directory.clan_members(clan_tag)?;
        let suggestions = members
            .iter()
            .take(PLAYER_SUGGESTIONS)
            .map(|m| m.name.clone())
            .collect();

        match best_member(name, &members, self.min_player_similarity) {
            Some(member) => {
                info!("Player '{}' resolved to {} ({})", name, member.name, member.tag);
                Ok(Resolution::hit(&member.tag, &member.name, suggestions))
            }
            None => {
                debug!(
                    "No roster entry of {} matches '{}' ({} members)",
                    clan_tag,
                    name,
                    members.len()
                );
                Ok(Resolution::miss(suggestions))
            }
        }
    }
}
