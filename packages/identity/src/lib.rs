#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire identity resolution.
//!
//! Satellites report the same burning area many times over several days.
//! Two detections belong to the same fire when their footprints intersect
//! and their dates fall within the [`AdjacencyWindow`]; the relation is
//! closed transitively with a union-find, so `A~B` and `B~C` put `A`, `B`
//! and `C` in one fire even if `A` and `C` never touch.
//!
//! Every pair is tested once, so resolution is quadratic in the batch size.
//! When the batch is sorted by date the inner scan stops at the first
//! detection 10 or more days later, which keeps a season-sized batch
//! (tens of thousands of detections) tractable.

pub mod union_find;

use std::{collections::BTreeMap, time::Instant};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use wildfire_fire_models::{
    CanonicalId, DetectionId, FireDetection, TaggedDetection, progress::ProgressCallback,
};

use crate::union_find::UnionFind;

/// Errors from identity resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Two linked detections ended up with different canonical ids.
    #[error(
        "detections {first} and {second} intersect within the window but were assigned \
         canonical ids {first_id} and {second_id}"
    )]
    InconsistentCluster {
        first: DetectionId,
        second: DetectionId,
        first_id: CanonicalId,
        second_id: CanonicalId,
    },

    /// The batch contains the same detection id twice.
    #[error("detection {0} appears more than once in the batch")]
    DuplicateDetection(DetectionId),

    /// A detection passed to [`CanonicalAssignment::tag`] was not resolved.
    #[error("detection {0} has no canonical id")]
    UnknownDetection(DetectionId),
}

/// Which date gaps allow two intersecting detections to merge.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdjacencyWindow {
    /// Gap of at most one day, or of three to nine days. A gap of exactly
    /// two days never merges.
    #[default]
    DayGap,
    /// Any gap; clustering is purely spatial.
    Unbounded,
}

impl AdjacencyWindow {
    /// Whether a gap of `days` (absolute, calendar days) is admissible.
    #[must_use]
    pub const fn admits(self, days: i64) -> bool {
        match self {
            Self::DayGap => days <= 1 || (days > 2 && days < 10),
            Self::Unbounded => true,
        }
    }

    /// Gap at which no later detection in a date-sorted batch can merge.
    const fn scan_limit(self) -> Option<i64> {
        match self {
            Self::DayGap => Some(10),
            Self::Unbounded => None,
        }
    }
}

/// Detection id to canonical id, for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalAssignment {
    ids: BTreeMap<DetectionId, CanonicalId>,
    order: Vec<(DetectionId, CanonicalId)>,
    cluster_count: u32,
}

impl CanonicalAssignment {
    #[must_use]
    pub fn get(&self, detection: DetectionId) -> Option<CanonicalId> {
        self.ids.get(&detection).copied()
    }

    /// Number of detections assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of distinct canonical fires.
    #[must_use]
    pub const fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    /// Assignments in input order.
    pub fn iter(&self) -> impl Iterator<Item = (DetectionId, CanonicalId)> + '_ {
        self.order.iter().copied()
    }

    /// Pairs each detection with its canonical id. Detections are cloned,
    /// never modified.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownDetection`] if a detection was not
    /// part of the resolved batch.
    pub fn tag(&self, detections: &[FireDetection]) -> Result<Vec<TaggedDetection>, ResolveError> {
        detections
            .iter()
            .map(|detection| {
                self.get(detection.id)
                    .map(|canonical_id| TaggedDetection {
                        detection: detection.clone(),
                        canonical_id,
                    })
                    .ok_or(ResolveError::UnknownDetection(detection.id))
            })
            .collect()
    }
}

/// Groups detections into canonical fires.
///
/// Canonical ids are allocated from 1 in order of each fire's first
/// detection in input order, so the same batch always yields the same ids.
///
/// # Errors
///
/// Returns [`ResolveError::DuplicateDetection`] if a detection id repeats,
/// or [`ResolveError::InconsistentCluster`] if a linked pair was split.
pub fn resolve_canonical_fires(
    detections: &[FireDetection],
    window: AdjacencyWindow,
    progress: &dyn ProgressCallback,
) -> Result<CanonicalAssignment, ResolveError> {
    let start = Instant::now();

    let mut seen = std::collections::BTreeSet::new();
    if let Some(duplicate) = detections.iter().find(|d| !seen.insert(d.id)) {
        return Err(ResolveError::DuplicateDetection(duplicate.id));
    }

    let sorted = detections.windows(2).all(|pair| pair[0].date() <= pair[1].date());
    if !sorted && window.scan_limit().is_some() {
        log::warn!("Detections are not sorted by date, scanning every pair");
    }

    progress.set_total(detections.len() as u64);
    progress.set_message(format!("Resolving {} detections", detections.len()));

    let mut sets = UnionFind::new(detections.len());
    let mut edges = Vec::new();

    for (i, current) in detections.iter().enumerate() {
        for (j, later) in detections.iter().enumerate().skip(i + 1) {
            let gap = (later.date() - current.date()).num_days().abs();
            if sorted && window.scan_limit().is_some_and(|limit| gap >= limit) {
                break;
            }
            // The day-gap window has a hole at 2 days; later detections 3..9
            // days out can still link, so only the scan limit ends the row.
            if !window.admits(gap) {
                continue;
            }
            if wildfire_geometry::intersects(&current.footprint, &later.footprint) {
                sets.union(i, j);
                edges.push((i, j));
            }
        }
        progress.inc(1);
    }

    let ids = assign_ids(&mut sets);
    check_edges(detections, &ids, &edges)?;

    let order: Vec<(DetectionId, CanonicalId)> = detections
        .iter()
        .zip(&ids)
        .map(|(detection, id)| (detection.id, *id))
        .collect();
    let cluster_count = ids.iter().map(|id| id.0).max().unwrap_or(0);

    progress.finish(format!(
        "{} detections -> {cluster_count} fires",
        detections.len()
    ));
    log::info!(
        "Resolved {} detections into {cluster_count} canonical fires ({} links) in {:.2?}",
        detections.len(),
        edges.len(),
        start.elapsed()
    );

    Ok(CanonicalAssignment {
        ids: order.iter().copied().collect(),
        order,
        cluster_count,
    })
}

/// Resolves and tags in one step.
///
/// # Errors
///
/// See [`resolve_canonical_fires`].
pub fn tag_detections(
    detections: &[FireDetection],
    window: AdjacencyWindow,
    progress: &dyn ProgressCallback,
) -> Result<Vec<TaggedDetection>, ResolveError> {
    resolve_canonical_fires(detections, window, progress)?.tag(detections)
}

/// Sequential ids in order of each set's first member.
fn assign_ids(sets: &mut UnionFind) -> Vec<CanonicalId> {
    let mut root_ids: Vec<Option<CanonicalId>> = vec![None; sets.len()];
    let mut next = 1_u32;
    (0..sets.len())
        .map(|i| {
            let root = sets.find(i);
            *root_ids[root].get_or_insert_with(|| {
                let id = CanonicalId(next);
                next += 1;
                id
            })
        })
        .collect()
}

fn check_edges(
    detections: &[FireDetection],
    ids: &[CanonicalId],
    edges: &[(usize, usize)],
) -> Result<(), ResolveError> {
    match edges.iter().find(|(a, b)| ids[*a] != ids[*b]) {
        Some(&(a, b)) => Err(ResolveError::InconsistentCluster {
            first: detections[a].id,
            second: detections[b].id,
            first_id: ids[a],
            second_id: ids[b],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use wildfire_fire_models::progress::NullProgress;

    use super::*;

    fn timestamp(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + chrono::Duration::days(i64::from(day))
    }

    fn detection(id: u64, day: u32, x: f64) -> FireDetection {
        let footprint = wildfire_geometry::parse(&format!(
            "POLYGON(({x} 52, {} 52, {} 53, {x} 53, {x} 52))",
            x + 1.0,
            x + 1.0
        ))
        .unwrap();
        FireDetection {
            id: DetectionId(id),
            source_id: format!("F{id}"),
            timestamp: timestamp(day),
            footprint,
            latitude: 52.5,
            longitude: x + 0.5,
        }
    }

    fn resolve(detections: &[FireDetection], window: AdjacencyWindow) -> Vec<u32> {
        let assignment = resolve_canonical_fires(detections, window, &NullProgress).unwrap();
        assignment.iter().map(|(_, id)| id.0).collect()
    }

    #[test]
    fn chain_of_overlaps_is_one_fire() {
        // 0 touches 1, 1 touches 2, 0 and 2 are disjoint.
        let detections = [
            detection(1, 0, 100.0),
            detection(2, 0, 100.8),
            detection(3, 1, 101.6),
        ];
        assert_eq!(resolve(&detections, AdjacencyWindow::DayGap), vec![1, 1, 1]);
    }

    #[test]
    fn twelve_day_gap_splits_fires() {
        let detections = [
            detection(1, 0, 100.0),
            detection(2, 1, 100.5),
            detection(3, 12, 100.2),
        ];
        assert_eq!(resolve(&detections, AdjacencyWindow::DayGap), vec![1, 1, 2]);
    }

    #[test]
    fn exact_two_day_gap_does_not_merge() {
        let detections = [detection(1, 0, 100.0), detection(2, 2, 100.5)];
        assert_eq!(resolve(&detections, AdjacencyWindow::DayGap), vec![1, 2]);
    }

    #[test]
    fn three_to_nine_day_gaps_merge() {
        for gap in 3..10 {
            let detections = [detection(1, 0, 100.0), detection(2, gap, 100.5)];
            assert_eq!(
                resolve(&detections, AdjacencyWindow::DayGap),
                vec![1, 1],
                "gap {gap}"
            );
        }
    }

    #[test]
    fn two_day_gap_does_not_stop_the_scan() {
        let detections = [
            detection(1, 0, 100.0),
            detection(2, 2, 100.5),
            detection(3, 4, 100.5),
        ];
        assert_eq!(resolve(&detections, AdjacencyWindow::DayGap), vec![1, 2, 1]);
    }

    #[test]
    fn unbounded_window_ignores_dates() {
        let detections = [
            detection(1, 0, 100.0),
            detection(2, 2, 100.5),
            detection(3, 40, 100.5),
        ];
        assert_eq!(resolve(&detections, AdjacencyWindow::Unbounded), vec![1, 1, 1]);
    }

    #[test]
    fn disjoint_footprints_never_merge() {
        let detections = [detection(1, 0, 100.0), detection(2, 0, 110.0)];
        assert_eq!(resolve(&detections, AdjacencyWindow::Unbounded), vec![1, 2]);
    }

    #[test]
    fn unsorted_input_still_links_every_pair() {
        let detections = [
            detection(1, 20, 100.0),
            detection(2, 0, 110.0),
            detection(3, 21, 100.5),
        ];
        assert_eq!(resolve(&detections, AdjacencyWindow::DayGap), vec![1, 2, 1]);
    }

    #[test]
    fn ids_follow_first_member_order() {
        let detections = [
            detection(1, 0, 120.0),
            detection(2, 0, 100.0),
            detection(3, 0, 120.5),
            detection(4, 0, 100.5),
        ];
        assert_eq!(resolve(&detections, AdjacencyWindow::DayGap), vec![1, 2, 1, 2]);
        let assignment =
            resolve_canonical_fires(&detections, AdjacencyWindow::DayGap, &NullProgress).unwrap();
        assert_eq!(assignment.cluster_count(), 2);
    }

    #[test]
    fn resolution_is_deterministic() {
        let detections: Vec<_> = (0..30_u32)
            .map(|i| detection(u64::from(i), i / 3, f64::from(i % 7) * 0.6))
            .collect();
        let first = resolve(&detections, AdjacencyWindow::DayGap);
        let second = resolve(&detections, AdjacencyWindow::DayGap);
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_detection_ids_are_rejected() {
        let detections = [detection(1, 0, 100.0), detection(1, 1, 100.0)];
        assert!(matches!(
            resolve_canonical_fires(&detections, AdjacencyWindow::DayGap, &NullProgress),
            Err(ResolveError::DuplicateDetection(DetectionId(1)))
        ));
    }

    #[test]
    fn split_edge_is_reported_with_both_detections() {
        let detections = [detection(7, 0, 100.0), detection(9, 0, 100.5)];
        let result = check_edges(
            &detections,
            &[CanonicalId(1), CanonicalId(2)],
            &[(0, 1)],
        );
        let Err(error) = result else {
            panic!("expected an inconsistent cluster");
        };
        let message = error.to_string();
        assert!(message.contains("detections 7 and 9"), "{message}");
    }

    #[test]
    fn tagging_keeps_detections_intact() {
        let detections = [detection(1, 0, 100.0), detection(2, 0, 100.5)];
        let tagged =
            tag_detections(&detections, AdjacencyWindow::DayGap, &NullProgress).unwrap();
        assert_eq!(tagged.len(), 2);
        assert_eq!(tagged[1].detection, detections[1]);
        assert_eq!(tagged[1].canonical_id, CanonicalId(1));

        let assignment =
            resolve_canonical_fires(&detections[..1], AdjacencyWindow::DayGap, &NullProgress)
                .unwrap();
        assert!(matches!(
            assignment.tag(&detections),
            Err(ResolveError::UnknownDetection(DetectionId(2)))
        ));
    }

    #[test]
    fn window_labels_parse() {
        assert_eq!("unbounded".parse::<AdjacencyWindow>().unwrap(), AdjacencyWindow::Unbounded);
        assert_eq!(AdjacencyWindow::default().to_string(), "day_gap");
    }
}
