//! Opponent profile assembled after a successful lookup

use serde::Serialize;

use super::decks::{compare_history, ladder_window, DeckComparison, SimilarityReport};
use crate::directory::models::{canonical_tag, BattleRecord, CardRef, Player};

/// Cards needed for a cycle estimate
const CYCLE_CARDS: usize = 4;

/// Identity block of the profile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub name: String,
    /// Canonical tag, no leading `#`
    pub tag: String,
    pub king_level: u32,
    pub trophies: u32,
    pub best_trophies: Option<u32>,
    pub clan_name: Option<String>,
    pub clan_tag: Option<String>,
    pub role: Option<String>,
    pub favourite_card: Option<String>,
}

impl PlayerSummary {
    pub fn from_player(player: &Player) -> Self {
        let favourite = player
            .current_favourite_card
            .as_ref()
            .or_else(|| player.current_deck.first())
            .and_then(|c| c.name.clone());

        Self {
            name: player.name.clone(),
            tag: canonical_tag(&player.tag),
            king_level: player.exp_level,
            trophies: player.trophies,
            best_trophies: player.best_trophies,
            clan_name: player.clan.as_ref().map(|c| c.name.clone()),
            clan_tag: player.clan.as_ref().map(|c| canonical_tag(&c.tag)),
            role: player.role.clone(),
            favourite_card: favourite,
        }
    }
}

/// Mean elixir cost of the costed cards, one decimal
pub fn average_elixir(cards: &[CardRef]) -> Option<f64> {
    let costs: Vec<f64> = cards.iter().filter_map(|c| c.elixir_cost).map(f64::from).collect();
    if costs.is_empty() {
        return None;
    }
    let mean = costs.iter().sum::<f64>() / costs.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// Sum of the four cheapest costs, rounded; 0 with fewer than four costed cards
pub fn four_card_cycle(cards: &[CardRef]) -> u32 {
    let mut costs: Vec<f32> = cards.iter().filter_map(|c| c.elixir_cost).collect();
    if costs.len() < CYCLE_CARDS {
        return 0;
    }
    costs.sort_by(f32::total_cmp);
    costs[..CYCLE_CARDS].iter().sum::<f32>().round() as u32
}

/// Win/loss record over recent ladder battles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LadderRecord {
    pub battles: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of decided battles won, 0 when none
    pub win_rate: f64,
    pub crowns_for: u32,
    pub crowns_against: u32,
}

impl LadderRecord {
    /// Tally the first `window` ladder battles of a most-recent-first log
    ///
    /// Draws count as battles but neither wins nor losses.
    pub fn from_battles(battles: &[BattleRecord], window: usize) -> Self {
        let mut record = Self::default();
        for battle in ladder_window(battles, window) {
            let (Some(mine), Some(theirs)) = (battle.team.first(), battle.opponent.first()) else {
                continue;
            };
            record.battles += 1;
            record.crowns_for += mine.crowns;
            record.crowns_against += theirs.crowns;
            if mine.crowns > theirs.crowns {
                record.wins += 1;
            } else if mine.crowns < theirs.crowns {
                record.losses += 1;
            }
        }

        let decided = record.wins + record.losses;
        if decided > 0 {
            record.win_rate = (record.wins as f64 * 1000.0 / decided as f64).round() / 10.0;
        }
        record
    }
}

/// Everything the `deck` event carries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeckProfile {
    pub player: PlayerSummary,
    pub current_deck: Vec<CardRef>,
    pub average_elixir: Option<f64>,
    pub four_card_cycle: u32,
    pub ladder: LadderRecord,
    pub history: Vec<DeckComparison>,
    pub similarity: SimilarityReport,
}

impl DeckProfile {
    /// Combine a player profile with its battle log
    pub fn build(player: &Player, battles: &[BattleRecord], window: usize) -> Self {
        let (history, similarity) =
            compare_history(&player.current_deck, battles, &player.tag, window);
        Self {
            player: PlayerSummary::from_player(player),
            current_deck: player.current_deck.clone(),
            average_elixir: average_elixir(&player.current_deck),
            four_card_cycle: four_card_cycle(&player.current_deck),
            ladder: LadderRecord::from_battles(battles, window),
            history,
            similarity,
        }
    }

    /// Multi-line plain-text rendering for terminals and logs
    pub fn render(&self) -> String {
        let p = &self.player;
        let mut out = format!("{} (#{}) - King {} - {} trophies", p.name, p.tag, p.king_level, p.trophies);
        if let Some(best) = p.best_trophies {
            out.push_str(&format!(" (best {})", best));
        }
        if let (Some(name), Some(tag)) = (&p.clan_name, &p.clan_tag) {
            out.push_str(&format!("\nClan: {} (#{})", name, tag));
            if let Some(role) = &p.role {
                out.push_str(&format!(" - {}", role));
            }
        }
        if let Some(fav) = &p.favourite_card {
            out.push_str(&format!("\nFavourite card: {}", fav));
        }

        let names: Vec<&str> = self.current_deck.iter().map(CardRef::display_name).collect();
        out.push_str(&format!("\nDeck: {}", names.join(", ")));
        match self.average_elixir {
            Some(avg) => out.push_str(&format!(
                "\nAvg elixir: {:.1} - 4-card cycle: {}",
                avg, self.four_card_cycle
            )),
            None => out.push_str("\nAvg elixir: n/a"),
        }

        let l = &self.ladder;
        out.push_str(&format!(
            "\nLadder (last {}): {}W/{}L - {:.1}% - crowns {}:{}",
            l.battles, l.wins, l.losses, l.win_rate, l.crowns_for, l.crowns_against
        ));

        let s = &self.similarity;
        out.push_str(&format!(
            "\nDeck history: {} decks - avg {:.0}% - best {:.0}% - {} exact",
            s.count,
            s.average * 100.0,
            s.best * 100.0,
            s.exact_count
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::models::{GameMode, Participant, PlayerClan};

    fn card(name: &str, cost: Option<f32>) -> CardRef {
        CardRef {
            name: Some(name.to_string()),
            elixir_cost: cost,
            ..Default::default()
        }
    }

    fn ladder(my_crowns: u32, their_crowns: u32, cards: Vec<CardRef>) -> BattleRecord {
        BattleRecord {
            battle_type: "PvP".to_string(),
            game_mode: Some(GameMode {
                id: None,
                name: "Ladder".to_string(),
            }),
            team: vec![Participant {
                tag: "#P1".to_string(),
                crowns: my_crowns,
                cards,
                ..Default::default()
            }],
            opponent: vec![Participant {
                tag: "#P2".to_string(),
                crowns: their_crowns,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_average_elixir_rounds_to_one_decimal() {
        let deck = vec![card("a", Some(3.0)), card("b", Some(4.0)), card("c", Some(4.0))];
        assert_eq!(average_elixir(&deck), Some(3.7));
        assert_eq!(average_elixir(&[card("x", None)]), None);
    }

    #[test]
    fn test_four_card_cycle() {
        let deck = vec![
            card("a", Some(5.0)),
            card("b", Some(1.0)),
            card("c", Some(2.0)),
            card("d", Some(3.0)),
            card("e", Some(2.0)),
        ];
        assert_eq!(four_card_cycle(&deck), 8);
        assert_eq!(four_card_cycle(&deck[..3]), 0);
    }

    #[test]
    fn test_favourite_falls_back_to_first_card() {
        let mut player = Player {
            tag: "#p1".to_string(),
            current_deck: vec![card("Knight", Some(3.0)), card("Miner", Some(3.0))],
            ..Default::default()
        };
        assert_eq!(
            PlayerSummary::from_player(&player).favourite_card.as_deref(),
            Some("Knight")
        );

        player.current_favourite_card = Some(card("Miner", None));
        let summary = PlayerSummary::from_player(&player);
        assert_eq!(summary.favourite_card.as_deref(), Some("Miner"));
        assert_eq!(summary.tag, "P1");
    }

    #[test]
    fn test_ladder_record() {
        let battles = vec![
            ladder(3, 0, vec![]),
            ladder(1, 2, vec![]),
            ladder(2, 1, vec![]),
            ladder(1, 1, vec![]),
        ];
        let record = LadderRecord::from_battles(&battles, 10);
        assert_eq!(record.battles, 4);
        assert_eq!(record.wins, 2);
        assert_eq!(record.losses, 1);
        assert_eq!(record.crowns_for, 7);
        assert_eq!(record.crowns_against, 4);
        assert!((record.win_rate - 66.7).abs() < 1e-9);
    }

    #[test]
    fn test_ladder_record_empty() {
        assert_eq!(LadderRecord::from_battles(&[], 10), LadderRecord::default());
    }

    #[test]
    fn test_build_profile() {
        let deck = vec![card("Knight", Some(3.0)), card("Miner", Some(3.0))];
        let player = Player {
            tag: "#P1".to_string(),
            name: "Max".to_string(),
            exp_level: 50,
            trophies: 7000,
            clan: Some(PlayerClan {
                tag: "#CLAN".to_string(),
                name: "Drablibe".to_string(),
            }),
            current_deck: deck.clone(),
            ..Default::default()
        };
        let battles = vec![ladder(3, 0, deck.clone()), ladder(0, 1, vec![card("Knight", None)])];

        let profile = DeckProfile::build(&player, &battles, 10);
        assert_eq!(profile.similarity.count, 2);
        assert_eq!(profile.history[0].shared_cards, 2);
        assert!((profile.similarity.best - 0.25).abs() < 1e-9);
        assert_eq!(profile.ladder.wins, 1);
        assert_eq!(profile.average_elixir, Some(3.0));

        let text = profile.render();
        assert!(text.starts_with("Max (#P1) - King 50 - 7000 trophies"));
        assert!(text.contains("Clan: Drablibe (#CLAN)"));
        assert!(text.contains("Deck: Knight, Miner"));
    }
}
