use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::store::{ScoreBound, ScoredMember};

/// In-memory sorted set: unique members ordered by score, equal scores
/// ordered by member bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    score: f64,
    member: String,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Inserts or moves `member` to `score`. Returns whether it was new.
    pub fn insert(&mut self, member: &str, score: f64) -> bool {
        let score = positive_zero(score);
        let previous = self.scores.insert(member.to_string(), score);

        if let Some(previous) = previous {
            self.ordered.remove(&Entry {
                score: previous,
                member: member.to_string(),
            });
        }

        self.ordered.insert(Entry {
            score,
            member: member.to_string(),
        });

        previous.is_none()
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Adds `delta` to the member's score, creating it at `delta`.
    /// Returns `None` without changing anything when the result is NaN.
    pub fn increment(&mut self, member: &str, delta: f64) -> Option<f64> {
        let score = positive_zero(self.score(member).unwrap_or(0.0) + delta);

        if score.is_nan() {
            return None;
        }

        self.insert(member, score);
        Some(score)
    }

    /// Entries in ascending order, starting at the first one `min` admits.
    fn from_min(&self, min: ScoreBound) -> impl Iterator<Item = &Entry> + '_ {
        let floor = match min {
            ScoreBound::Inclusive(score) | ScoreBound::Exclusive(score) => score,
            ScoreBound::NegInfinity => f64::NEG_INFINITY,
            ScoreBound::PosInfinity => f64::INFINITY,
        };

        // Only members tied at an exclusive floor are stepped over.
        self.ordered
            .range(Entry {
                score: floor,
                member: String::new(),
            }..)
            .skip_while(move |entry| !min.admits_as_min(entry.score))
    }

    pub fn count(&self, min: ScoreBound, max: ScoreBound) -> usize {
        self.from_min(min)
            .take_while(|entry| max.admits_as_max(entry.score))
            .count()
    }

    pub fn range_by_score(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        offset: usize,
        count: usize,
    ) -> Vec<ScoredMember> {
        self.from_min(min)
            .take_while(|entry| max.admits_as_max(entry.score))
            .skip(offset)
            .take(count)
            .map(Entry::to_scored_member)
            .collect()
    }

    /// Members between ranks `start` and `stop` inclusive. With `reverse`,
    /// rank 0 is the highest score.
    pub fn range_by_rank(&self, start: i64, stop: i64, reverse: bool) -> Vec<ScoredMember> {
        let Some((start, stop)) = normalize_rank_window(self.len(), start, stop) else {
            return Vec::new();
        };

        let window = stop - start + 1;

        if reverse {
            self.ordered
                .iter()
                .rev()
                .skip(start)
                .take(window)
                .map(Entry::to_scored_member)
                .collect()
        } else {
            self.ordered
                .iter()
                .skip(start)
                .take(window)
                .map(Entry::to_scored_member)
                .collect()
        }
    }
}

/// Zero is stored as `0.0` so that `-0.0` and `0.0` are one score.
fn positive_zero(score: f64) -> f64 {
    if score == 0.0 {
        0.0
    } else {
        score
    }
}

impl Entry {
    fn to_scored_member(&self) -> ScoredMember {
        ScoredMember::new(self.member.clone(), self.score)
    }
}

/// Resolves negative ranks against `len` and clamps the window to the set.
/// Returns `None` when nothing falls inside it.
pub fn normalize_rank_window(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;

    let start = (if start < 0 { len + start } else { start }).max(0);
    let stop = (if stop < 0 { len + stop } else { stop }).min(len - 1);

    if start >= len || start > stop {
        return None;
    }

    Some((start as usize, stop as usize))
}
