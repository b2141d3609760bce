//! Longitudinal scoring and snapshot comparison.
//!
//! One resolution rule is used for every aggregation in the system: the
//! consultant score wins whenever present, otherwise the respondent score,
//! otherwise zero. Axis score = mean of its three block scores; the overall
//! score = mean of all block scores across all axes, rounded to one decimal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AxisResponse, BlockResponse, SnapshotPayload, VersionSnapshot};

/// Effective score of one block: consultant over respondent, default 0.
pub fn effective_score(block: &BlockResponse) -> f64 {
    block
        .consultant_score
        .or(block.score)
        .map(f64::from)
        .unwrap_or(0.0)
}

/// Mean of the three block scores of an axis.
pub fn axis_score(axis: &AxisResponse) -> f64 {
    let blocks = [&axis.positive, &axis.negative, &axis.solution];
    blocks.iter().map(|b| effective_score(b)).sum::<f64>() / blocks.len() as f64
}

/// Overall score of a payload: mean over every block of every axis,
/// rounded to one decimal. Empty payloads score 0.
pub fn aggregate_score(payload: &SnapshotPayload) -> f64 {
    let scores: Vec<f64> = payload
        .axes
        .iter()
        .flat_map(|a| [&a.positive, &a.negative, &a.solution])
        .map(effective_score)
        .collect();
    if scores.is_empty() {
        return 0.0;
    }
    round1(scores.iter().sum::<f64>() / scores.len() as f64)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Milestone display label for a version number: version 1 is "T0".
pub fn milestone_label(version_number: u32) -> String {
    format!("T{}", version_number.saturating_sub(1))
}

/// One axis row of a two-snapshot comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisDelta {
    pub axis_key: String,
    pub score_a: f64,
    pub score_b: f64,
    pub delta: f64,
}

/// Per-axis and aggregate deltas between two snapshots of one assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub snapshot_a: Uuid,
    pub snapshot_b: Uuid,
    pub version_a: u32,
    pub version_b: u32,
    pub label_a: String,
    pub label_b: String,
    pub axes: Vec<AxisDelta>,
    pub aggregate_a: f64,
    pub aggregate_b: f64,
    pub aggregate_delta: f64,
}

/// Compare two snapshots. Axis rows cover the union of axis keys in both
/// payloads, in first-seen order; an axis missing on one side scores 0.
pub fn compare(a: &VersionSnapshot, b: &VersionSnapshot) -> ComparisonReport {
    let mut keys: Vec<&str> = Vec::new();
    for axis in a.payload.axes.iter().chain(b.payload.axes.iter()) {
        if !keys.contains(&axis.axis_key.as_str()) {
            keys.push(&axis.axis_key);
        }
    }

    let score_of = |payload: &SnapshotPayload, key: &str| {
        payload
            .axes
            .iter()
            .find(|x| x.axis_key == key)
            .map(axis_score)
            .unwrap_or(0.0)
    };

    let axes = keys
        .into_iter()
        .map(|key| {
            let score_a = round1(score_of(&a.payload, key));
            let score_b = round1(score_of(&b.payload, key));
            AxisDelta {
                axis_key: key.to_string(),
                score_a,
                score_b,
                delta: round1(score_b - score_a),
            }
        })
        .collect();

    let aggregate_a = aggregate_score(&a.payload);
    let aggregate_b = aggregate_score(&b.payload);
    ComparisonReport {
        snapshot_a: a.id,
        snapshot_b: b.id,
        version_a: a.version_number,
        version_b: b.version_number,
        label_a: a.label.clone(),
        label_b: b.label.clone(),
        axes,
        aggregate_a,
        aggregate_b,
        aggregate_delta: round1(aggregate_b - aggregate_a),
    }
}

/// Compact per-snapshot summary for multi-version (T0, T1, T2…) views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub snapshot_id: Uuid,
    pub version_number: u32,
    pub label: String,
    pub aggregate: f64,
}

pub fn summarize(snapshot: &VersionSnapshot) -> SnapshotSummary {
    SnapshotSummary {
        snapshot_id: snapshot.id,
        version_number: snapshot.version_number,
        label: snapshot.label.clone(),
        aggregate: aggregate_score(&snapshot.payload),
    }
}
