//! Deck similarity over recent ladder battles

use serde::Serialize;
use std::collections::BTreeSet;

use crate::directory::models::{BattleRecord, CardRef};

/// Canonical full-deck size, the fixed similarity denominator
pub const DECK_SIZE: usize = 8;

/// Similarity at or above this counts as the same deck
pub const EXACT_MATCH: f64 = 0.999;

/// Default number of ladder battles analysed
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

const EXCLUDED_MODES: [&str; 3] = ["river", "boat", "clan war"];
const LADDER_MODES: [&str; 5] = ["ranked", "path of legends", "ladder", "trophy road", "league"];

/// Set of card keys in a deck; duplicates collapse
pub type CardKeys = BTreeSet<String>;

pub fn deck_keys(cards: &[CardRef]) -> CardKeys {
    cards.iter().filter_map(CardRef::card_key).collect()
}

/// |A ∩ B| / 8, capped at 1
pub fn similarity(a: &CardKeys, b: &CardKeys) -> f64 {
    let shared = a.intersection(b).count().min(DECK_SIZE);
    shared as f64 / DECK_SIZE as f64
}

pub fn is_exact(similarity: f64) -> bool {
    similarity >= EXACT_MATCH
}

/// Ranked 1v1 battle eligible for deck history
///
/// Excludes draft, friendly, challenge and clan-war/river/boat battles and
/// requires a recognized ladder mode name.
pub fn is_ladder_battle(battle: &BattleRecord) -> bool {
    if !battle.battle_type.eq_ignore_ascii_case("pvp") {
        return false;
    }
    if battle.team.len() != 1 || battle.opponent.len() != 1 {
        return false;
    }
    let selection = battle.deck_selection.as_deref().unwrap_or("").to_lowercase();
    if selection.contains("draft") || battle.is_friendly || battle.is_challenge() {
        return false;
    }

    let mode = battle.mode().to_lowercase();
    if EXCLUDED_MODES.iter().any(|m| mode.contains(m)) {
        return false;
    }
    LADDER_MODES.iter().any(|m| mode.contains(m))
}

/// Up to `window` ladder battles from a most-recent-first log
pub fn ladder_window(battles: &[BattleRecord], window: usize) -> Vec<&BattleRecord> {
    battles
        .iter()
        .filter(|b| is_ladder_battle(b))
        .take(window)
        .collect()
}

/// One historical deck compared to the current one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckComparison {
    pub battle_time: Option<String>,
    pub mode: String,
    pub similarity: f64,
    pub shared_cards: usize,
    pub exact: bool,
    pub cards: Vec<CardRef>,
}

/// Aggregate over the analysed window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimilarityReport {
    pub count: usize,
    pub average: f64,
    pub best: f64,
    pub exact_count: usize,
}

impl SimilarityReport {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        Self {
            count: scores.len(),
            average: scores.iter().sum::<f64>() / scores.len() as f64,
            best: scores.iter().copied().fold(0.0, f64::max),
            exact_count: scores.iter().filter(|s| is_exact(**s)).count(),
        }
    }
}

/// Compare `current` with the decks `player_tag` used in recent ladder battles
///
/// Battles are scanned most-recent-first; collection stops once `window`
/// decks with extractable cards are gathered.
pub fn compare_history(
    current: &[CardRef],
    battles: &[BattleRecord],
    player_tag: &str,
    window: usize,
) -> (Vec<DeckComparison>, SimilarityReport) {
    let current_keys = deck_keys(current);
    let mut comparisons = Vec::new();

    for battle in battles.iter().filter(|b| is_ladder_battle(b)) {
        if comparisons.len() >= window {
            break;
        }
        let Some(cards) = battle.cards_of(player_tag) else {
            continue;
        };
        let keys = deck_keys(cards);
        let score = similarity(&current_keys, &keys);
        comparisons.push(DeckComparison {
            battle_time: battle.battle_time.clone(),
            mode: battle.mode().to_string(),
            similarity: score,
            shared_cards: current_keys.intersection(&keys).count(),
            exact: is_exact(score),
            cards: cards.to_vec(),
        });
    }

    let scores: Vec<f64> = comparisons.iter().map(|c| c.similarity).collect();
    (comparisons, SimilarityReport::from_scores(&scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::models::{GameMode, Participant};

    fn cards(names: &[&str]) -> Vec<CardRef> {
        names
            .iter()
            .map(|n| CardRef {
                name: Some(n.to_string()),
                ..Default::default()
            })
            .collect()
    }

    fn keys(names: &[&str]) -> CardKeys {
        deck_keys(&cards(names))
    }

    fn battle(mode: &str, me: &[&str]) -> BattleRecord {
        BattleRecord {
            battle_type: "PvP".to_string(),
            game_mode: Some(GameMode {
                id: None,
                name: mode.to_string(),
            }),
            deck_selection: Some("collection".to_string()),
            team: vec![Participant {
                tag: "#ME".to_string(),
                cards: cards(me),
                ..Default::default()
            }],
            opponent: vec![Participant {
                tag: "#THEM".to_string(),
                cards: cards(&["X"]),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    const DECK: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

    #[test]
    fn test_seven_of_eight_is_not_exact() {
        let s = similarity(&keys(&DECK), &keys(&["A", "B", "C", "D", "E", "F", "G", "Z"]));
        assert!((s - 0.875).abs() < 1e-9);
        assert!(!is_exact(s));
    }

    #[test]
    fn test_identical_deck_is_exact() {
        let s = similarity(&keys(&DECK), &keys(&DECK));
        assert!(is_exact(s));
    }

    #[test]
    fn test_self_similarity_uses_fixed_denominator() {
        let partial = keys(&["A", "B", "C"]);
        assert!((similarity(&partial, &partial) - 3.0 / 8.0).abs() < 1e-9);

        let oversized = keys(&["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"]);
        assert!((similarity(&oversized, &oversized) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_symmetric_and_bounded() {
        let a = keys(&["A", "B", "C", "Q"]);
        let b = keys(&DECK);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
        assert!((0.0..=1.0).contains(&similarity(&a, &b)));
        assert_eq!(similarity(&a, &CardKeys::new()), 0.0);
    }

    #[test]
    fn test_duplicate_cards_counted_once() {
        let dup = keys(&["A", "a", "A", "B"]);
        assert_eq!(dup.len(), 2);
        assert!((similarity(&dup, &keys(&DECK)) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_ladder_filter() {
        assert!(is_ladder_battle(&battle("Ladder", &DECK)));
        assert!(is_ladder_battle(&battle("Ranked1v1_NewArena", &DECK)));
        assert!(is_ladder_battle(&battle("Path of Legends", &DECK)));

        let mut friendly = battle("Ladder", &DECK);
        friendly.is_friendly = true;
        assert!(!is_ladder_battle(&friendly));

        let mut challenge = battle("Ladder", &DECK);
        challenge.challenge_title = Some("Grand Challenge".to_string());
        assert!(!is_ladder_battle(&challenge));

        let mut draft = battle("Ladder", &DECK);
        draft.deck_selection = Some("eventDeckDraft".to_string());
        assert!(!is_ladder_battle(&draft));

        let mut two_v_two = battle("Ladder", &DECK);
        two_v_two.team.push(Participant::default());
        assert!(!is_ladder_battle(&two_v_two));

        let mut river = battle("Ladder", &DECK);
        river.battle_type = "riverRacePvP".to_string();
        assert!(!is_ladder_battle(&river));

        assert!(!is_ladder_battle(&battle("ClanWar_BoatBattle", &DECK)));
        assert!(!is_ladder_battle(&battle("Touchdown", &DECK)));
    }

    #[test]
    fn test_friendly_excluded_from_window() {
        let mut friendly = battle("Ladder", &DECK);
        friendly.is_friendly = true;
        let battles = vec![friendly, battle("Ladder", &["A", "B"])];
        let (comparisons, report) = compare_history(&cards(&DECK), &battles, "#ME", 10);
        assert_eq!(comparisons.len(), 1);
        assert_eq!(report.count, 1);
        assert!((report.best - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_window_stops_at_limit() {
        let battles: Vec<BattleRecord> = (0..15).map(|_| battle("Ladder", &DECK)).collect();
        let (comparisons, report) = compare_history(&cards(&DECK), &battles, "me", 10);
        assert_eq!(comparisons.len(), 10);
        assert_eq!(report.count, 10);
        assert_eq!(report.exact_count, 10);
        assert_eq!(ladder_window(&battles, 4).len(), 4);
    }

    #[test]
    fn test_report_aggregates() {
        let battles = vec![
            battle("Ladder", &DECK),
            battle("Ladder", &["A", "B", "C", "D", "E", "F", "G", "Z"]),
            battle("Ladder", &["A", "B", "C", "D"]),
        ];
        let (comparisons, report) = compare_history(&cards(&DECK), &battles, "#ME", 10);
        assert_eq!(comparisons[1].shared_cards, 7);
        assert!(comparisons[0].exact);
        assert_eq!(report.count, 3);
        assert_eq!(report.exact_count, 1);
        assert!((report.best - 1.0).abs() < 1e-9);
        assert!((report.average - (1.0 + 0.875 + 0.5) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_report() {
        let (comparisons, report) = compare_history(&cards(&DECK), &[], "#ME", 10);
        assert!(comparisons.is_empty());
        assert_eq!(
            report,
            SimilarityReport {
                count: 0,
                average: 0.0,
                best: 0.0,
                exact_count: 0
            }
        );
    }

    #[test]
    fn test_battles_without_player_cards_skipped() {
        let battles = vec![battle("Ladder", &DECK)];
        let (comparisons, report) = compare_history(&cards(&DECK), &battles, "#SOMEONE", 10);
        assert!(comparisons.is_empty());
        assert_eq!(report, SimilarityReport::default());
    }
}
