//! Class balancing of the training split by synthetic minority oversampling.
//!
//! Only ever adds rows. Originals keep their order and values; synthetic rows
//! are appended after them and carry no date semantics: every non-feature
//! column is left missing and the label is the minority class.

use crate::domain::error::{PipelineError, Stage};
use crate::domain::frame::{Cell, Frame};
use crate::domain::neighbors::KdTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceParams {
    /// Desired minority/majority ratio after oversampling, in `(0, 1]`.
    pub target_ratio: f64,
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            target_ratio: 0.8,
            k_neighbors: 3,
            seed: 42,
        }
    }
}

impl BalanceParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.target_ratio > 0.0 && self.target_ratio <= 1.0) {
            return Err(PipelineError::InvalidParameter {
                stage: Stage::Balance,
                reason: format!("target_ratio must be within (0, 1], got {}", self.target_ratio),
            });
        }
        if self.k_neighbors < 1 {
            return Err(PipelineError::InvalidParameter {
                stage: Stage::Balance,
                reason: "k_neighbors must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// What the balancer decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceDecision {
    /// No rows to balance.
    Empty,
    /// Minority/majority already at or above the target; input returned unchanged.
    AlreadyBalanced { ratio: f64 },
    Oversampled {
        minority_label: i64,
        k_neighbors: usize,
        generated: usize,
    },
}

/// Synthetic minority rows produced by [`Balancer::resample`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub decision: BalanceDecision,
    pub synthetic: Vec<Vec<f64>>,
}

/// A minority oversampling technique.
///
/// Implementors only provide [`Balancer::synthesize`]; the fallback and
/// clamping policy in [`Balancer::resample`] is shared.
pub trait Balancer {
    fn name(&self) -> &'static str;

    /// Build `count` new points from `minority`. `k_neighbors < minority.len()` always holds.
    fn synthesize(
        &self,
        minority: &[&[f64]],
        count: usize,
        k_neighbors: usize,
        rng: &mut StdRng,
    ) -> Vec<Vec<f64>>;

    fn resample(
        &self,
        features: &[Vec<f64>],
        labels: &[i64],
        params: &BalanceParams,
    ) -> Result<Resampled, PipelineError> {
        params.validate()?;
        if labels.is_empty() {
            return Ok(Resampled {
                decision: BalanceDecision::Empty,
                synthetic: Vec::new(),
            });
        }

        let counts = class_counts(labels);
        if counts.len() > 2 {
            return Err(PipelineError::InvalidParameter {
                stage: Stage::Balance,
                reason: format!("expected a binary label, found {} classes", counts.len()),
            });
        }

        let (minority_label, minority_count) = minority_class(&counts);
        let majority_count = counts.values().copied().max().unwrap_or(0);
        let ratio = if counts.len() == 1 {
            1.0
        } else {
            minority_count as f64 / majority_count as f64
        };
        info!(
            "minority class {} = {}, majority = {}, ratio = {:.4}",
            minority_label, minority_count, majority_count, ratio
        );

        if ratio >= params.target_ratio {
            warn!(
                "current ratio {:.4} >= target {}, skipping oversampling",
                ratio, params.target_ratio
            );
            return Ok(Resampled {
                decision: BalanceDecision::AlreadyBalanced { ratio },
                synthetic: Vec::new(),
            });
        }

        if minority_count <= 1 {
            return Err(PipelineError::InsufficientData {
                stage: Stage::Balance,
                reason: format!(
                    "minority class {} has {} sample(s), at least 2 are needed to oversample",
                    minority_label, minority_count
                ),
            });
        }

        let mut k_neighbors = params.k_neighbors;
        if k_neighbors >= minority_count {
            k_neighbors = (minority_count - 1).max(1);
            warn!(
                "k_neighbors adjusted to {} (minority class has only {} samples)",
                k_neighbors, minority_count
            );
        }

        let target_minority = (majority_count as f64 * params.target_ratio).floor() as usize;
        let count = target_minority.saturating_sub(minority_count);
        info!(
            "target minority count {}, generating {} samples with {}",
            target_minority,
            count,
            self.name()
        );

        let minority: Vec<&[f64]> = features
            .iter()
            .zip(labels)
            .filter(|(_, l)| **l == minority_label)
            .map(|(f, _)| f.as_slice())
            .collect();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let synthetic = self.synthesize(&minority, count, k_neighbors, &mut rng);

        Ok(Resampled {
            decision: BalanceDecision::Oversampled {
                minority_label,
                k_neighbors,
                generated: synthetic.len(),
            },
            synthetic,
        })
    }
}

/// Nearest-neighbor interpolation: each new point lies on the segment between
/// a random minority point and one of its `k` nearest minority neighbors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Smote;

impl Balancer for Smote {
    fn name(&self) -> &'static str {
        "SMOTE"
    }

    fn synthesize(
        &self,
        minority: &[&[f64]],
        count: usize,
        k_neighbors: usize,
        rng: &mut StdRng,
    ) -> Vec<Vec<f64>> {
        if minority.len() < 2 || count == 0 {
            return Vec::new();
        }

        let tree = KdTree::build(minority);
        let mut neighbors: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let i = rng.gen_range(0..minority.len());
            let nn = neighbors
                .entry(i)
                .or_insert_with(|| tree.nearest(i, k_neighbors));
            let j = nn[rng.gen_range(0..nn.len())];
            let gap: f64 = rng.r#gen();
            out.push(interpolate(minority[i], minority[j], gap));
        }
        out
    }
}

fn interpolate(a: &[f64], b: &[f64], gap: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + gap * (y - x)).collect()
}

fn class_counts(labels: &[i64]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_insert(0) += 1;
    }
    counts
}

/// Smallest class by count; ties go to the higher label.
fn minority_class(counts: &BTreeMap<i64, usize>) -> (i64, usize) {
    counts
        .iter()
        .map(|(l, c)| (*l, *c))
        .min_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .unwrap_or((0, 0))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassShare {
    pub label: i64,
    pub count: usize,
    pub percentage: f64,
}

/// Per-class counts and percentages of a label column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassDistribution {
    pub total: usize,
    pub classes: Vec<ClassShare>,
}

impl ClassDistribution {
    pub fn from_labels(labels: &[i64]) -> Self {
        let total = labels.len();
        let classes = class_counts(labels)
            .into_iter()
            .map(|(label, count)| ClassShare {
                label,
                count,
                percentage: count as f64 / total as f64 * 100.0,
            })
            .collect();
        Self { total, classes }
    }

    pub fn count(&self, label: i64) -> usize {
        self.classes
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// Before/after class distribution. Computed for observability only.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub before: ClassDistribution,
    pub after: ClassDistribution,
    pub decision: BalanceDecision,
}

impl BalanceReport {
    pub fn synthetic_rows(&self) -> usize {
        self.after.total - self.before.total
    }

    fn log(&self) {
        info!("balancing comparison (before vs after)");
        for before in &self.before.classes {
            let after_count = self.after.count(before.label);
            let after_pct = self
                .after
                .classes
                .iter()
                .find(|c| c.label == before.label)
                .map(|c| c.percentage)
                .unwrap_or(0.0);
            info!(
                "class {}: before {:>10} ({:>6.2}%) -> after {:>10} ({:>6.2}%) | added {:>8}",
                before.label,
                before.count,
                before.percentage,
                after_count,
                after_pct,
                after_count - before.count
            );
        }
        info!(
            "total samples: {} -> {} (+{})",
            self.before.total,
            self.after.total,
            self.synthetic_rows()
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceOutcome {
    pub rows: Frame,
    pub report: BalanceReport,
}

fn parse_label(cell: &Cell, row: usize, column: &str) -> Result<i64, PipelineError> {
    match cell {
        Cell::Number(v) if v.is_finite() && v.fract() == 0.0 => Ok(*v as i64),
        other => Err(PipelineError::InvalidValue {
            stage: Stage::Balance,
            row,
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Oversample the minority class of `rows` (the training split) up to `params.target_ratio`.
///
/// Feature columns are the non-label columns outside `passthrough` holding
/// finite numbers in every row; only those take part in neighbor search and
/// interpolation. Synthetic rows hold `Missing` in every other column.
pub fn balance(
    rows: Frame,
    label_column: &str,
    passthrough: &[&str],
    params: &BalanceParams,
    technique: &dyn Balancer,
) -> Result<BalanceOutcome, PipelineError> {
    let label_idx = rows.require_column(Stage::Balance, label_column)?;

    let labels = rows
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| parse_label(&r[label_idx], i, label_column))
        .collect::<Result<Vec<i64>, _>>()?;

    let feature_columns: Vec<usize> = (0..rows.column_count())
        .filter(|&c| c != label_idx)
        .filter(|&c| !passthrough.contains(&rows.columns()[c].as_str()))
        .filter(|&c| {
            rows.rows()
                .iter()
                .all(|r| matches!(r[c], Cell::Number(v) if v.is_finite()))
        })
        .collect();
    debug!(
        "{} feature columns, {} passthrough columns",
        feature_columns.len(),
        rows.column_count() - feature_columns.len() - 1
    );

    let features: Vec<Vec<f64>> = rows
        .rows()
        .iter()
        .map(|r| {
            feature_columns
                .iter()
                .map(|&c| r[c].as_number().unwrap_or(0.0))
                .collect()
        })
        .collect();

    let before = ClassDistribution::from_labels(&labels);
    let resampled = technique.resample(&features, &labels, params)?;

    let mut rows = rows;
    let mut after_labels = labels;
    if let BalanceDecision::Oversampled { minority_label, .. } = resampled.decision {
        let width = rows.column_count();
        for point in &resampled.synthetic {
            let mut cells = vec![Cell::Missing; width];
            for (&c, v) in feature_columns.iter().zip(point) {
                cells[c] = Cell::Number(*v);
            }
            cells[label_idx] = Cell::Number(minority_label as f64);
            rows.push_row(cells);
            after_labels.push(minority_label);
        }
    }

    let report = BalanceReport {
        before,
        after: ClassDistribution::from_labels(&after_labels),
        decision: resampled.decision,
    };
    report.log();

    Ok(BalanceOutcome { rows, report })
}
