//! Opponent lookup: resolve clan, then player, then fetch and analyse
//!
//! Shared by the scan worker and manual lookups. Misses and network faults
//! are reported as status events; only a vanished consumer stops it.

use tracing::{info, warn};

use crate::analysis::DeckProfile;
use crate::directory::EntityResolver;
use crate::error::NetworkError;
use crate::shared::{Disconnected, EventSender, PipelineEvent};

/// How a lookup ended
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Profile built; `history_error` is set when the battle log could not be
    /// fetched and the profile carries no history
    Found {
        profile: Box<DeckProfile>,
        history_error: Option<String>,
    },
    ClanNotFound { suggestions: Vec<String> },
    PlayerNotFound { clan: String, suggestions: Vec<String> },
}

/// Resolve `(player, clan)` and build the deck profile
pub fn find_opponent(
    resolver: &EntityResolver,
    player_name: &str,
    clan_name: &str,
    history_window: usize,
) -> Result<LookupOutcome, NetworkError> {
    let clan = resolver.resolve_clan(clan_name)?;
    let Some(clan_tag) = clan.tag else {
        return Ok(LookupOutcome::ClanNotFound {
            suggestions: clan.suggestions,
        });
    };

    let player = resolver.resolve_player(&clan_tag, player_name)?;
    let Some(player_tag) = player.tag else {
        return Ok(LookupOutcome::PlayerNotFound {
            clan: clan.display_name,
            suggestions: player.suggestions,
        });
    };

    let directory = resolver.directory();
    let profile = directory.player(&player_tag)?;
    let (battles, history_error) = match directory.battle_log(&player_tag) {
        Ok(battles) => (battles, None),
        Err(e) => {
            warn!("Battle log of {} unavailable: {}", profile.name, e);
            (Vec::new(), Some(e.to_string()))
        }
    };
    info!(
        "Fetched {} ({} battles in log)",
        profile.name,
        battles.len()
    );
    Ok(LookupOutcome::Found {
        profile: Box::new(DeckProfile::build(&profile, &battles, history_window)),
        history_error,
    })
}

/// Run a lookup and report it on the event channel
///
/// Emits `loading(true)`, progress and the outcome, then `loading(false)`.
pub fn run_lookup(
    resolver: &EntityResolver,
    events: &EventSender,
    player_name: &str,
    clan_name: &str,
    history_window: usize,
) -> Result<(), Disconnected> {
    events.send(PipelineEvent::Loading(true))?;
    events.status(format!("Looking up '{}' in clan '{}'...", player_name, clan_name))?;

    let result = find_opponent(resolver, player_name, clan_name, history_window);
    let reported = match result {
        Ok(LookupOutcome::Found {
            profile,
            history_error,
        }) => {
            let name = profile.player.name.clone();
            events.send(PipelineEvent::Deck(profile)).and_then(|_| match history_error {
                Some(e) => events.status(format!("Loaded {}, battle log unavailable: {}", name, e)),
                None => events.status(format!("Loaded {}", name)),
            })
        }
        Ok(LookupOutcome::ClanNotFound { suggestions }) => {
            info!("Clan '{}' not found", clan_name);
            events.status(with_suggestions(
                &format!("Clan '{}' not found", clan_name),
                &suggestions,
            ))
        }
        Ok(LookupOutcome::PlayerNotFound { clan, suggestions }) => {
            info!("Player '{}' not found in {}", player_name, clan);
            events.status(with_suggestions(
                &format!("Player '{}' not found in {}", player_name, clan),
                &suggestions,
            ))
        }
        Err(e) => {
            warn!("Lookup failed: {}", e);
            events.status(format!("Lookup failed: {}", e))
        }
    };

    // Always close the loading state the lookup opened
    let closed = events.send(PipelineEvent::Loading(false));
    reported.and(closed)
}

fn with_suggestions(message: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        message.to_string()
    } else {
        format!("{}. Did you mean: {}", message, suggestions.join(", "))
    }
}
