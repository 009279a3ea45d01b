//! Keyed aggregate tables computed once from a reference source and joined back onto rows.
//!
//! Every table carries the policy used when a row's key was never seen in the
//! reference: `Missing` for rates and ranks, `Zero` for counts, `Neutral` for
//! features that define an explicit midpoint.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MissPolicy {
    Missing,
    Zero,
    Neutral(f64),
}

impl MissPolicy {
    pub fn resolve(self) -> Option<f64> {
        match self {
            Self::Missing => None,
            Self::Zero => Some(0.0),
            Self::Neutral(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedStatistic<K> {
    values: BTreeMap<K, f64>,
    policy: MissPolicy,
}

impl<K: Ord + Clone> GroupedStatistic<K> {
    pub fn from_values(values: BTreeMap<K, f64>, policy: MissPolicy) -> Self {
        Self { values, policy }
    }

    /// Number of occurrences of each key.
    pub fn count<I>(keys: I, policy: MissPolicy) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let mut values = BTreeMap::new();
        for key in keys {
            *values.entry(key).or_insert(0.0) += 1.0;
        }
        Self { values, policy }
    }

    /// Mean of the present values per key. Keys whose values are all missing are absent.
    pub fn mean<I>(pairs: I, policy: MissPolicy) -> Self
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
    {
        let mut sums: BTreeMap<K, (f64, u64)> = BTreeMap::new();
        for (key, value) in pairs {
            let Some(value) = value else {
                continue;
            };
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        let values = sums
            .into_iter()
            .map(|(key, (sum, n))| (key, sum / n as f64))
            .collect();
        Self { values, policy }
    }

    /// Number of distinct members seen with each key.
    pub fn distinct<I, M>(pairs: I, policy: MissPolicy) -> Self
    where
        I: IntoIterator<Item = (K, M)>,
        M: Ord,
    {
        let mut members: BTreeMap<K, BTreeSet<M>> = BTreeMap::new();
        for (key, member) in pairs {
            members.entry(key).or_default().insert(member);
        }

        let values = members
            .into_iter()
            .map(|(key, set)| (key, set.len() as f64))
            .collect();
        Self { values, policy }
    }

    pub fn policy(&self) -> MissPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }

    pub fn get(&self, key: &K) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Looks up `key`, resolving a miss with this table's policy.
    pub fn apply(&self, key: &K) -> Option<f64> {
        self.get(key).or_else(|| self.policy.resolve())
    }

    /// Joins the table onto a column of row keys.
    pub fn apply_all(&self, keys: &[K]) -> Vec<Option<f64>> {
        keys.iter().map(|key| self.apply(key)).collect()
    }

    /// Percentile rank of every key's value among all keys.
    pub fn percentile_rank(&self) -> GroupedStatistic<K> {
        let mut sorted: Vec<f64> = self.values.values().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let values = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), rank_in(&sorted, *value)))
            .collect();
        GroupedStatistic {
            values,
            policy: MissPolicy::Missing,
        }
    }

    /// Percentile rank of every key's value among the keys of its own group.
    ///
    /// A group with a single key gets `single_member` when given, otherwise 1.0.
    pub fn percentile_rank_within<G, F>(
        &self,
        group_of: F,
        single_member: Option<f64>,
    ) -> GroupedStatistic<K>
    where
        G: Ord,
        F: Fn(&K) -> G,
    {
        let mut groups: BTreeMap<G, Vec<f64>> = BTreeMap::new();
        for (key, value) in &self.values {
            groups.entry(group_of(key)).or_default().push(*value);
        }
        for members in groups.values_mut() {
            members.sort_by(f64::total_cmp);
        }

        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                let members = groups.get(&group_of(key))?;
                let rank = match (members.len(), single_member) {
                    (1, Some(neutral)) => neutral,
                    _ => rank_in(members, *value),
                };
                Some((key.clone(), rank))
            })
            .collect();
        GroupedStatistic {
            values,
            policy: MissPolicy::Missing,
        }
    }

    /// The `n` keys with the largest values; ties go to the smaller key.
    pub fn top_n(&self, n: usize) -> BTreeSet<K> {
        let mut entries: Vec<(&K, f64)> = self.iter().collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
            .into_iter()
            .take(n)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Mean of `apply(key)` over a sequence of row keys, skipping misses.
    pub fn mean_over_keys<'a, I>(&self, keys: I) -> Option<f64>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let (sum, n) = keys
            .into_iter()
            .filter_map(|key| self.apply(key))
            .fold((0.0, 0u64), |(sum, n), value| (sum + value, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

fn rank_in(sorted: &[f64], value: f64) -> f64 {
    let at_or_below = sorted.partition_point(|v| *v <= value);
    at_or_below as f64 / sorted.len() as f64
}
