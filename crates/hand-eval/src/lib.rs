//! Best-five-card hand evaluation.
//!
//! `evaluate` takes a player's two hole cards plus 3-5 community cards and
//! returns the strongest five-card hand among every 5-card subset, as a
//! category, a totally ordered comparison value, and a human description.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use poker_domain::{Card, Rank};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("need 5 to 7 cards to evaluate, got {0}")]
    WrongCardCount(usize),
    #[error("duplicate card {0}")]
    DuplicateCard(Card),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum HandCategory {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    /// Protocol identifier, matching the serde representation.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::HighCard => "high-card",
            Self::Pair => "pair",
            Self::TwoPair => "two-pair",
            Self::ThreeOfAKind => "three-of-a-kind",
            Self::Straight => "straight",
            Self::Flush => "flush",
            Self::FullHouse => "full-house",
            Self::FourOfAKind => "four-of-a-kind",
            Self::StraightFlush => "straight-flush",
            Self::RoyalFlush => "royal-flush",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::HighCard => "High Card",
            Self::Pair => "Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
            Self::RoyalFlush => "Royal Flush",
        }
    }
}

/// Total order over hands: category first, then up to five tiebreak ranks
/// in decreasing significance. Stronger hands compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandValue {
    pub category: HandCategory,
    pub tiebreak: [u8; 5],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandEvaluation {
    pub category: HandCategory,
    pub value: HandValue,
    pub description: String,
    pub best_five: [Card; 5],
}

pub fn evaluate(hole: &[Card; 2], community: &[Card]) -> Result<HandEvaluation, EvalError> {
    let mut cards = Vec::with_capacity(2 + community.len());
    cards.extend_from_slice(hole);
    cards.extend_from_slice(community);
    if !(5..=7).contains(&cards.len()) {
        return Err(EvalError::WrongCardCount(cards.len()));
    }
    let mut seen = std::collections::HashSet::with_capacity(cards.len());
    for card in &cards {
        if !seen.insert(*card) {
            return Err(EvalError::DuplicateCard(*card));
        }
    }

    let mut subsets = five_card_subsets(&cards).into_iter();
    let first = subsets
        .next()
        .ok_or(EvalError::WrongCardCount(cards.len()))?;
    let mut best_five = first;
    let mut value = rank_five(&first);
    for five in subsets {
        let candidate = rank_five(&five);
        if candidate > value {
            best_five = five;
            value = candidate;
        }
    }

    Ok(HandEvaluation {
        category: value.category,
        description: describe(value),
        value,
        best_five,
    })
}

fn five_card_subsets(cards: &[Card]) -> Vec<[Card; 5]> {
    let n = cards.len();
    let mut out = Vec::new();
    let mut idx = [0usize; 5];
    fn rec(cards: &[Card], start: usize, depth: usize, idx: &mut [usize; 5], out: &mut Vec<[Card; 5]>) {
        if depth == 5 {
            let mut five = [cards[idx[0]]; 5];
            for (slot, &i) in five.iter_mut().zip(idx.iter()) {
                *slot = cards[i];
            }
            out.push(five);
            return;
        }
        for i in start..cards.len() - (4 - depth) {
            idx[depth] = i;
            rec(cards, i + 1, depth + 1, idx, out);
        }
    }
    rec(cards, 0, 0, &mut idx, &mut out);
    debug_assert_eq!(out.len(), binomial(n));
    out
}

fn binomial(n: usize) -> usize {
    match n {
        5 => 1,
        6 => 6,
        7 => 21,
        _ => 0,
    }
}

/// Rank exactly five cards.
fn rank_five(five: &[Card; 5]) -> HandValue {
    let mut ranks: Vec<u8> = five.iter().map(|c| c.rank.value()).collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = five.iter().all(|c| c.suit == five[0].suit);
    let straight_high = straight_high(&ranks);

    // (count, rank) groups, highest count first, then highest rank.
    let mut groups: Vec<(u8, u8)> = Vec::new();
    for &r in &ranks {
        match groups.iter_mut().find(|(_, rank)| *rank == r) {
            Some((count, _)) => *count += 1,
            None => groups.push((1, r)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    if let (true, Some(high)) = (is_flush, straight_high) {
        let category = if high == Rank::Ace.value() {
            HandCategory::RoyalFlush
        } else {
            HandCategory::StraightFlush
        };
        return HandValue {
            category,
            tiebreak: [high, 0, 0, 0, 0],
        };
    }

    match groups.as_slice() {
        [(4, quad), (1, kicker)] => HandValue {
            category: HandCategory::FourOfAKind,
            tiebreak: [*quad, *kicker, 0, 0, 0],
        },
        [(3, trips), (2, pair)] => HandValue {
            category: HandCategory::FullHouse,
            tiebreak: [*trips, *pair, 0, 0, 0],
        },
        _ if is_flush => HandValue {
            category: HandCategory::Flush,
            tiebreak: kickers(&ranks),
        },
        _ if straight_high.is_some() => HandValue {
            category: HandCategory::Straight,
            tiebreak: [straight_high.unwrap_or_default(), 0, 0, 0, 0],
        },
        [(3, trips), (1, k1), (1, k2)] => HandValue {
            category: HandCategory::ThreeOfAKind,
            tiebreak: [*trips, *k1, *k2, 0, 0],
        },
        [(2, hi), (2, lo), (1, kicker)] => HandValue {
            category: HandCategory::TwoPair,
            tiebreak: [*hi, *lo, *kicker, 0, 0],
        },
        [(2, pair), (1, k1), (1, k2), (1, k3)] => HandValue {
            category: HandCategory::Pair,
            tiebreak: [*pair, *k1, *k2, *k3, 0],
        },
        _ => HandValue {
            category: HandCategory::HighCard,
            tiebreak: kickers(&ranks),
        },
    }
}

fn kickers(ranks_desc: &[u8]) -> [u8; 5] {
    let mut out = [0u8; 5];
    for (slot, &r) in out.iter_mut().zip(ranks_desc.iter()) {
        *slot = r;
    }
    out
}

/// High card of a straight formed by these five ranks, if any.
/// The wheel A-2-3-4-5 counts as a 5-high straight.
fn straight_high(ranks_desc: &[u8]) -> Option<u8> {
    let mut unique = ranks_desc.to_vec();
    unique.dedup();
    if unique.len() != 5 {
        return None;
    }
    if unique[0] - unique[4] == 4 {
        return Some(unique[0]);
    }
    if unique == [14, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}

fn describe(value: HandValue) -> String {
    let t = value.tiebreak;
    match value.category {
        HandCategory::HighCard => format!("{} High", rank_word(t[0])),
        HandCategory::Pair => format!("Pair of {}", rank_plural(t[0])),
        HandCategory::TwoPair => {
            format!("Two Pair, {} and {}", rank_plural(t[0]), rank_plural(t[1]))
        }
        HandCategory::ThreeOfAKind => format!("Three of a Kind, {}", rank_plural(t[0])),
        HandCategory::Straight => format!("Straight, {} High", rank_word(t[0])),
        HandCategory::Flush => format!("Flush, {} High", rank_word(t[0])),
        HandCategory::FullHouse => format!(
            "Full House, {} full of {}",
            rank_plural(t[0]),
            rank_plural(t[1])
        ),
        HandCategory::FourOfAKind => format!("Four of a Kind, {}", rank_plural(t[0])),
        HandCategory::StraightFlush => format!("Straight Flush, {} High", rank_word(t[0])),
        HandCategory::RoyalFlush => "Royal Flush".to_string(),
    }
}

fn rank_word(value: u8) -> &'static str {
    match value {
        2 => "2",
        3 => "3",
        4 => "4",
        5 => "5",
        6 => "6",
        7 => "7",
        8 => "8",
        9 => "9",
        10 => "10",
        11 => "Jack",
        12 => "Queen",
        13 => "King",
        14 => "Ace",
        _ => "?",
    }
}

fn rank_plural(value: u8) -> String {
    format!("{}s", rank_word(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poker_domain::Suit;

    fn card(spec: &str) -> Card {
        let (rank_part, suit_part) = spec.split_at(spec.len() - 1);
        let rank = Rank::ALL
            .into_iter()
            .find(|r| r.label() == rank_part)
            .expect("rank");
        let suit = match suit_part {
            "s" => Suit::Spades,
            "h" => Suit::Hearts,
            "d" => Suit::Diamonds,
            "c" => Suit::Clubs,
            other => panic!("bad suit {other}"),
        };
        Card::new(suit, rank)
    }

    fn cards(specs: &[&str]) -> Vec<Card> {
        specs.iter().map(|s| card(s)).collect()
    }

    fn eval(hole: [&str; 2], board: &[&str]) -> HandEvaluation {
        let hole = [card(hole[0]), card(hole[1])];
        evaluate(&hole, &cards(board)).expect("evaluate")
    }

    #[test]
    fn detects_each_category() {
        let e = eval(["Ah", "Kh"], &["Qh", "Jh", "10h", "2c", "3d"]);
        assert_eq!(e.category, HandCategory::RoyalFlush);
        assert_eq!(e.description, "Royal Flush");

        let e = eval(["9s", "8s"], &["7s", "6s", "5s", "Ad", "Ac"]);
        assert_eq!(e.category, HandCategory::StraightFlush);
        assert_eq!(e.description, "Straight Flush, 9 High");

        let e = eval(["Ks", "Kh"], &["Kd", "Kc", "5s", "9h", "2d"]);
        assert_eq!(e.category, HandCategory::FourOfAKind);
        assert_eq!(e.description, "Four of a Kind, Kings");

        let e = eval(["Ks", "Kh"], &["Kd", "5c", "5s", "9h", "2d"]);
        assert_eq!(e.category, HandCategory::FullHouse);
        assert_eq!(e.description, "Full House, Kings full of 5s");

        let e = eval(["As", "2s"], &["9s", "6s", "4s", "Kh", "Kd"]);
        assert_eq!(e.category, HandCategory::Flush);
        assert_eq!(e.description, "Flush, Ace High");

        let e = eval(["9c", "8d"], &["7s", "6h", "5d", "Ks", "Kd"]);
        assert_eq!(e.category, HandCategory::Straight);
        assert_eq!(e.description, "Straight, 9 High");

        let e = eval(["Qs", "Qh"], &["Qd", "9c", "5s", "3h", "2d"]);
        assert_eq!(e.category, HandCategory::ThreeOfAKind);
        assert_eq!(e.description, "Three of a Kind, Queens");

        let e = eval(["As", "Ah"], &["8d", "8c", "5s", "3h", "2d"]);
        assert_eq!(e.category, HandCategory::TwoPair);
        assert_eq!(e.description, "Two Pair, Aces and 8s");

        let e = eval(["Qs", "Qh"], &["9d", "7c", "5s", "3h", "2d"]);
        assert_eq!(e.category, HandCategory::Pair);
        assert_eq!(e.description, "Pair of Queens");

        let e = eval(["As", "Jh"], &["9d", "7c", "5s", "3h", "2d"]);
        assert_eq!(e.category, HandCategory::HighCard);
        assert_eq!(e.description, "Ace High");
    }

    #[test]
    fn wheel_is_a_five_high_straight() {
        let wheel = eval(["As", "2h"], &["3d", "4c", "5s", "Kh", "9d"]);
        assert_eq!(wheel.category, HandCategory::Straight);
        assert_eq!(wheel.description, "Straight, 5 High");

        // A-2-3-4-5 beats ace-high no pair.
        let ace_high = eval(["Ac", "Jh"], &["9d", "7c", "5h", "3s", "2c"]);
        assert!(wheel.value > ace_high.value);

        // A-2-3-4-5 loses to 2-3-4-5-6.
        let six_high = eval(["6s", "2h"], &["3d", "4c", "5c", "Kh", "9d"]);
        assert_eq!(six_high.category, HandCategory::Straight);
        assert!(six_high.value > wheel.value);
    }

    #[test]
    fn kickers_break_ties_in_descending_order() {
        let top_kicker = eval(["As", "Kh"], &["Ad", "9c", "7s", "4h", "2d"]);
        let low_kicker = eval(["Ac", "Qh"], &["Ad", "9c", "7s", "4h", "2d"]);
        assert_eq!(top_kicker.category, HandCategory::Pair);
        assert!(top_kicker.value > low_kicker.value);

        let same = eval(["Ah", "Kd"], &["Ad", "9c", "7s", "4h", "2d"]);
        assert_eq!(same.value, top_kicker.value);
    }

    #[test]
    fn picks_the_best_five_of_seven() {
        // Board pairs plus a pocket pair: best hand is the board flush, not
        // two pair.
        let e = eval(["2s", "2h"], &["Kc", "Qc", "9c", "5c", "3c"]);
        assert_eq!(e.category, HandCategory::Flush);

        // Three community cards only (early evaluation).
        let e = eval(["As", "Ad"], &["Ah", "Kc", "Qd"]);
        assert_eq!(e.category, HandCategory::ThreeOfAKind);
    }

    #[test]
    fn rejects_bad_input() {
        let hole = [card("As"), card("Kd")];
        assert!(matches!(
            evaluate(&hole, &cards(&["2c", "3c"])),
            Err(EvalError::WrongCardCount(4))
        ));
        assert!(matches!(
            evaluate(&hole, &cards(&["As", "3c", "4c", "5c", "6c"])),
            Err(EvalError::DuplicateCard(_))
        ));
    }

    #[test]
    fn category_order_matches_poker_rules() {
        assert!(HandCategory::RoyalFlush > HandCategory::StraightFlush);
        assert!(HandCategory::StraightFlush > HandCategory::FourOfAKind);
        assert!(HandCategory::FullHouse > HandCategory::Flush);
        assert!(HandCategory::Flush > HandCategory::Straight);
        assert!(HandCategory::Pair > HandCategory::HighCard);
    }
}
