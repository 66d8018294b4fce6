use crate::{Descriptor, Keypoint};
use std::collections::HashSet;

/// Keypoint paired with the descriptor computed at it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}

/// Ordered features detected in one image.
///
/// Order is detector-defined and only meaningful within one set. Keypoint
/// coordinates are always in the source image's pixel space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    features: Vec<Feature>,
    width: u32,
    height: u32,
}

impl FeatureSet {
    pub fn new(width: u32, height: u32, features: Vec<Feature>) -> Self {
        Self {
            features,
            width,
            height,
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Feature> {
        self.features.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn keypoints(&self) -> impl Iterator<Item = &Keypoint> + '_ {
        self.features.iter().map(|f| &f.keypoint)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> + '_ {
        self.features.iter().map(|f| &f.descriptor)
    }

    /// Dimensions of the image the set was extracted from
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Mean corner response, 0 for an empty set
    pub fn mean_response(&self) -> f32 {
        if self.features.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.features.iter().map(|f| f.keypoint.response).sum();
        sum / self.features.len() as f32
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Claimed same-point match between a query feature and a train feature.
///
/// Point coordinates are copied from the two feature sets so a
/// `CorrespondenceSet` is self-contained for estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Descriptor distance, lower is better
    pub distance: f32,
    pub query_point: (f64, f64),
    pub train_point: (f64, f64),
}

impl Correspondence {
    pub fn new(
        query_idx: usize,
        train_idx: usize,
        distance: f32,
        query_point: (f64, f64),
        train_point: (f64, f64),
    ) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
            query_point,
            train_point,
        }
    }

    /// Build from two feature sets, resolving the point coordinates
    pub fn between(
        query: &FeatureSet,
        query_idx: usize,
        train: &FeatureSet,
        train_idx: usize,
        distance: f32,
    ) -> Option<Self> {
        let q = query.get(query_idx)?.keypoint;
        let t = train.get(train_idx)?.keypoint;
        Some(Self::new(
            query_idx,
            train_idx,
            distance,
            (q.x as f64, q.y as f64),
            (t.x as f64, t.y as f64),
        ))
    }
}

/// Correspondences between exactly two feature sets.
///
/// Each `(query_idx, train_idx)` pair appears at most once and every
/// distance is finite and non-negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceSet {
    matches: Vec<Correspondence>,
    pairs: HashSet<(usize, usize)>,
}

impl CorrespondenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a correspondence; returns false when rejected as duplicate or malformed
    pub fn push(&mut self, c: Correspondence) -> bool {
        if !c.distance.is_finite() || c.distance < 0.0 {
            return false;
        }
        if !self.pairs.insert((c.query_idx, c.train_idx)) {
            return false;
        }
        self.matches.push(c);
        true
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn as_slice(&self) -> &[Correspondence] {
        &self.matches
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Correspondence> {
        self.matches.iter()
    }

    /// Keep only the correspondences at the given positions
    pub fn subset(&self, positions: &[usize]) -> Self {
        positions
            .iter()
            .filter_map(|&i| self.matches.get(i).copied())
            .collect()
    }
}

impl FromIterator<Correspondence> for CorrespondenceSet {
    fn from_iter<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        let mut set = Self::new();
        for c in iter {
            set.push(c);
        }
        set
    }
}

impl<'a> IntoIterator for &'a CorrespondenceSet {
    type Item = &'a Correspondence;
    type IntoIter = std::slice::Iter<'a, Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}
