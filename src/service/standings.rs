use crate::error::Result;
use crate::model::bet::Bet;
use crate::model::round::BettingRound;
use crate::model::standing::{FormTrend, Standing};
use crate::model::{CompetitionId, RoundId, UserId};
use crate::repository::gateway::PersistenceGateway;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Accuracy swing, in percentage points, between the latest and third-latest round that counts
/// as a change of form.
pub const FORM_SWING_THRESHOLD: f64 = 10.0;

#[derive(Default)]
struct Tally {
    total_points: i64,
    bets_placed: usize,
    scored: Vec<Bet>,
    round_wins: usize,
    competition_round_wins: usize,
}

/// Read-only fold of every bet row into ranked standings.
pub struct StandingsAggregator {
    gateway: Arc<dyn PersistenceGateway>,
}

impl StandingsAggregator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        StandingsAggregator { gateway }
    }

    pub async fn standings(&self, competition_id: CompetitionId) -> Result<Vec<Standing>> {
        let rounds = self.gateway.get_rounds(None).await?;
        let bets = self.gateway.get_all_bets().await?;
        Ok(aggregate(&rounds, &bets, competition_id))
    }
}

/// Builds standings for `competition_id`.
///
/// Rows are ordered by total points first. Round wins are counted across every competition and
/// separately within this one, and only break ties on points in that order. Users equal on all
/// three share a rank.
pub fn aggregate(rounds: &[BettingRound], bets: &[Bet], competition_id: CompetitionId) -> Vec<Standing> {
    let rounds: HashMap<RoundId, &BettingRound> = rounds.iter().map(|r| (r.id, r)).collect();
    let mut tallies: BTreeMap<UserId, Tally> = BTreeMap::new();

    for bet in bets {
        let Some(round) = rounds.get(&bet.round_id) else {
            continue;
        };
        if round.competition_id != competition_id {
            continue;
        }
        let tally = tallies.entry(bet.user_id).or_default();
        tally.bets_placed += 1;
        if round.is_scored() {
            tally.total_points += i64::from(bet.points());
            tally.scored.push(bet.clone());
        }
    }

    for (round_id, winners) in round_winners(&rounds, bets) {
        let in_competition = rounds
            .get(&round_id)
            .is_some_and(|r| r.competition_id == competition_id);
        for user_id in winners {
            if let Some(tally) = tallies.get_mut(&user_id) {
                tally.round_wins += 1;
                if in_competition {
                    tally.competition_round_wins += 1;
                }
            }
        }
    }

    let mut standings: Vec<Standing> = tallies
        .into_iter()
        .map(|(user_id, mut tally)| {
            tally
                .scored
                .sort_by_key(|bet| (bet.round_id, bet.fixture_id));
            let correct = tally.scored.iter().filter(|b| b.is_correct()).count();
            let (current_streak, best_streak) = streaks(&tally.scored);
            Standing {
                user_id,
                rank: 0,
                total_points: tally.total_points,
                rounds_played: per_round_accuracy(&tally.scored).len(),
                round_wins: tally.round_wins,
                competition_round_wins: tally.competition_round_wins,
                bets_placed: tally.bets_placed,
                correct_predictions: correct,
                accuracy: percentage(correct, tally.scored.len()),
                current_streak,
                best_streak,
                form: form_trend(&tally.scored),
            }
        })
        .collect();

    standings.sort_by(|a, b| compare(a, b).then_with(|| a.user_id.cmp(&b.user_id)));
    assign_ranks(&mut standings);
    standings
}

fn compare(a: &Standing, b: &Standing) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| b.round_wins.cmp(&a.round_wins))
        .then_with(|| b.competition_round_wins.cmp(&a.competition_round_wins))
}

/// Standard competition ranking: ties share a rank and the next rank skips ("1, 1, 3").
fn assign_ranks(standings: &mut [Standing]) {
    for i in 0..standings.len() {
        standings[i].rank = if i > 0 && compare(&standings[i - 1], &standings[i]) == Ordering::Equal {
            standings[i - 1].rank
        } else {
            i + 1
        };
    }
}

/// Users holding the best total of each scored round. A round whose best total is 0 has no winner.
fn round_winners(
    rounds: &HashMap<RoundId, &BettingRound>,
    bets: &[Bet],
) -> BTreeMap<RoundId, Vec<UserId>> {
    let mut totals: BTreeMap<RoundId, HashMap<UserId, i64>> = BTreeMap::new();
    for bet in bets {
        if rounds.get(&bet.round_id).is_some_and(|r| r.is_scored()) {
            *totals
                .entry(bet.round_id)
                .or_default()
                .entry(bet.user_id)
                .or_insert(0) += i64::from(bet.points());
        }
    }
    totals
        .into_iter()
        .filter_map(|(round_id, per_user)| {
            let best = per_user.values().copied().max().filter(|best| *best > 0)?;
            let winners = per_user
                .into_iter()
                .filter(|(_, total)| *total == best)
                .map(|(user_id, _)| user_id)
                .collect();
            Some((round_id, winners))
        })
        .collect()
}

/// `(current, best)` runs of correct predictions over bets sorted oldest first.
fn streaks(bets: &[Bet]) -> (usize, usize) {
    let mut current = 0;
    let mut best = 0;
    for bet in bets {
        if bet.is_correct() {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    (current, best)
}

fn per_round_accuracy(bets: &[Bet]) -> Vec<(RoundId, f64)> {
    let mut rounds: BTreeMap<RoundId, (usize, usize)> = BTreeMap::new();
    for bet in bets {
        let entry = rounds.entry(bet.round_id).or_default();
        entry.1 += 1;
        if bet.is_correct() {
            entry.0 += 1;
        }
    }
    rounds
        .into_iter()
        .map(|(round_id, (correct, total))| (round_id, percentage(correct, total)))
        .collect()
}

fn form_trend(bets: &[Bet]) -> FormTrend {
    let recent: Vec<f64> = per_round_accuracy(bets)
        .into_iter()
        .rev()
        .take(3)
        .map(|(_, accuracy)| accuracy)
        .collect();
    if recent.len() < 3 {
        return FormTrend::Stable;
    }
    let swing = recent[0] - recent[2];
    if swing > FORM_SWING_THRESHOLD {
        FormTrend::Improving
    } else if swing < -FORM_SWING_THRESHOLD {
        FormTrend::Declining
    } else {
        FormTrend::Stable
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
