use rayon::prelude::*;
use stab_brief::hamming_distance;
use stab_core::{
    Correspondence, CorrespondenceSet, FeatureMatching, FeatureSet, MatcherSettings,
};
use std::collections::HashMap;
use tracing::debug;

/// Brute-force Hamming matcher with Lowe's ratio test.
///
/// Each query feature keeps its nearest train feature when that neighbour is
/// clearly closer than the runner-up. When several queries claim the same
/// train feature only the closest survives (lower query index on ties).
#[derive(Debug, Clone, Default)]
pub struct FeatureMatcher {
    settings: MatcherSettings,
}

impl FeatureMatcher {
    pub fn new(settings: MatcherSettings) -> Self {
        Self { settings }
    }

    pub fn with_ratio(ratio_threshold: f32) -> Self {
        Self::new(MatcherSettings {
            ratio_threshold,
            ..MatcherSettings::default()
        })
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Nearest neighbour of `query_idx` as `(train_idx, distance)` if it passes the ratio test
    fn best_candidate(&self, query: &FeatureSet, query_idx: usize, train: &FeatureSet) -> Option<(usize, u32)> {
        let descriptor = &query.get(query_idx)?.descriptor;
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut best_idx = None;

        for (train_idx, feature) in train.iter().enumerate() {
            let d = hamming_distance(descriptor, &feature.descriptor);
            if d < best {
                second = best;
                best = d;
                best_idx = Some(train_idx);
            } else if d < second {
                second = d;
            }
        }

        let train_idx = best_idx?;
        // Without a runner-up the match cannot be told apart from chance
        if second == u32::MAX {
            return None;
        }
        if (best as f32) >= self.settings.ratio_threshold * second as f32 {
            return None;
        }
        if self.settings.max_distance.is_some_and(|max| best > max) {
            return None;
        }
        Some((train_idx, best))
    }
}

impl FeatureMatching for FeatureMatcher {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> CorrespondenceSet {
        if query.is_empty() || train.is_empty() {
            return CorrespondenceSet::new();
        }

        let candidates: Vec<(usize, usize, u32)> = (0..query.len())
            .into_par_iter()
            .filter_map(|qi| {
                self.best_candidate(query, qi, train)
                    .map(|(ti, d)| (qi, ti, d))
            })
            .collect();

        // One query per train feature
        let mut claimed: HashMap<usize, (usize, u32)> = HashMap::new();
        for &(qi, ti, d) in &candidates {
            claimed
                .entry(ti)
                .and_modify(|held| {
                    if (d, qi) < (held.1, held.0) {
                        *held = (qi, d);
                    }
                })
                .or_insert((qi, d));
        }

        let mut kept: Vec<(usize, usize, u32)> =
            claimed.into_iter().map(|(ti, (qi, d))| (qi, ti, d)).collect();
        kept.sort_unstable_by_key(|&(qi, _, _)| qi);

        let set: CorrespondenceSet = kept
            .into_iter()
            .filter_map(|(qi, ti, d)| Correspondence::between(query, qi, train, ti, d as f32))
            .collect();

        debug!(
            query = query.len(),
            train = train.len(),
            candidates = candidates.len(),
            matches = set.len(),
            "descriptor matching"
        );
        set
    }
}
