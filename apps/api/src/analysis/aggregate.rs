//! Aggregation: turns per-frame scores into category means, a weighted
//! overall score, a simulated world rank and a qualitative summary.
//!
//! Pure computation apart from the rank draw, which takes an injected RNG.
//!
//! The rank is a uniform draw inside a score bucket, not a percentile:
//! identical scores yield different ranks across runs.

use std::ops::RangeInclusive;

use rand::Rng;

use crate::analysis::scorer::FrameScore;
use crate::analysis::AnalysisError;
use crate::models::analysis::{AnalysisResult, DetailedAnalysis};

/// Substituted for any sub-score the oracle left out.
pub const DEFAULT_SUB_SCORE: f64 = 6.0;
/// Category mean at or above this is a strength.
pub const STRENGTH_THRESHOLD: f64 = 8.0;
/// Category mean strictly below this is a weakness.
pub const WEAKNESS_THRESHOLD: f64 = 6.0;

const TECHNIQUE_WEIGHT: f64 = 0.30;
const FOOTWORK_WEIGHT: f64 = 0.25;
const STRATEGY_WEIGHT: f64 = 0.25;
const FITNESS_WEIGHT: f64 = 0.20;

/// Rank buckets, checked top-down. The first bucket whose `min_score` is
/// at or below the overall score wins.
pub struct RankBucket {
    pub min_score: f64,
    pub ranks: RangeInclusive<i32>,
}

pub const RANK_BUCKETS: [RankBucket; 9] = [
    RankBucket { min_score: 9.5, ranks: 1..=100 },
    RankBucket { min_score: 9.0, ranks: 101..=1_000 },
    RankBucket { min_score: 8.5, ranks: 1_001..=10_000 },
    RankBucket { min_score: 8.0, ranks: 10_001..=100_000 },
    RankBucket { min_score: 7.5, ranks: 100_001..=1_000_000 },
    RankBucket { min_score: 7.0, ranks: 1_000_001..=10_000_000 },
    RankBucket { min_score: 6.5, ranks: 10_000_001..=30_000_000 },
    RankBucket { min_score: 6.0, ranks: 30_000_001..=60_000_000 },
    RankBucket { min_score: 5.5, ranks: 60_000_001..=100_000_000 },
];

/// Recreational players below every bucket.
pub const CATCH_ALL_RANKS: RangeInclusive<i32> = 80_000_001..=100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Technique,
    Footwork,
    Strategy,
    Fitness,
}

impl Category {
    /// Order in which summary sentences are emitted.
    const ALL: [Category; 4] = [
        Category::Technique,
        Category::Footwork,
        Category::Strategy,
        Category::Fitness,
    ];

    fn sub_score(self, frame: &FrameScore) -> Option<f64> {
        match self {
            Category::Technique => frame.technique_score,
            Category::Footwork => frame.footwork_score,
            Category::Strategy => frame.positioning_score,
            Category::Fitness => frame.athleticism_score,
        }
    }

    fn strength(self) -> &'static str {
        match self {
            Category::Technique => "Excellent racquet technique and swing mechanics",
            Category::Footwork => "Superior footwork and court movement",
            Category::Strategy => "Strategic court positioning",
            Category::Fitness => "Strong athletic foundation",
        }
    }

    fn weakness(self) -> &'static str {
        match self {
            Category::Technique => "Inconsistent racquet technique",
            Category::Footwork => "Limited footwork efficiency",
            Category::Strategy => "Suboptimal court positioning",
            Category::Fitness => "Fitness and athleticism need improvement",
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Category::Technique => "Focus on fundamental stroke mechanics with a coach",
            Category::Footwork => "Practice ladder drills and movement patterns",
            Category::Strategy => "Study professional match tactics and positioning",
            Category::Fitness => "Incorporate tennis-specific fitness training",
        }
    }
}

/// Unrounded per-category means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMeans {
    pub technique: f64,
    pub footwork: f64,
    pub strategy: f64,
    pub fitness: f64,
}

impl CategoryMeans {
    fn get(&self, category: Category) -> f64 {
        match category {
            Category::Technique => self.technique,
            Category::Footwork => self.footwork,
            Category::Strategy => self.strategy,
            Category::Fitness => self.fitness,
        }
    }

    pub fn overall(&self) -> f64 {
        TECHNIQUE_WEIGHT * self.technique
            + FOOTWORK_WEIGHT * self.footwork
            + STRATEGY_WEIGHT * self.strategy
            + FITNESS_WEIGHT * self.fitness
    }
}

pub fn category_means(records: &[FrameScore]) -> Result<CategoryMeans, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let mean = |category: Category| {
        let total: f64 = records
            .iter()
            .map(|r| category.sub_score(r).unwrap_or(DEFAULT_SUB_SCORE))
            .sum();
        total / records.len() as f64
    };

    Ok(CategoryMeans {
        technique: mean(Category::Technique),
        footwork: mean(Category::Footwork),
        strategy: mean(Category::Strategy),
        fitness: mean(Category::Fitness),
    })
}

/// Rounds half away from zero to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn rank_range(overall_score: f64) -> RangeInclusive<i32> {
    RANK_BUCKETS
        .iter()
        .find(|bucket| overall_score >= bucket.min_score)
        .map(|bucket| bucket.ranks.clone())
        .unwrap_or(CATCH_ALL_RANKS)
}

pub fn world_ranking<R: Rng>(overall_score: f64, rng: &mut R) -> i32 {
    rng.random_range(rank_range(overall_score))
}

/// Threshold rules over the unrounded means, plus every frame's technical
/// notes in input order.
pub fn summarize(means: &CategoryMeans, records: &[FrameScore]) -> DetailedAnalysis {
    let mut detail = DetailedAnalysis::default();

    for category in Category::ALL {
        let mean = means.get(category);
        if mean >= STRENGTH_THRESHOLD {
            detail.strengths.push(category.strength().to_string());
        } else if mean < WEAKNESS_THRESHOLD {
            detail.weaknesses.push(category.weakness().to_string());
            detail
                .recommendations
                .push(category.recommendation().to_string());
        }
    }

    detail.technical_notes = records
        .iter()
        .filter_map(|r| r.technical_notes.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    detail
}

/// Aggregates with the thread-local RNG.
pub fn aggregate(records: &[FrameScore]) -> Result<AnalysisResult, AnalysisError> {
    aggregate_with_rng(records, &mut rand::rng())
}

pub fn aggregate_with_rng<R: Rng>(
    records: &[FrameScore],
    rng: &mut R,
) -> Result<AnalysisResult, AnalysisError> {
    let means = category_means(records)?;
    let overall_score = round1(means.overall());

    if !overall_score.is_finite() {
        return Err(AnalysisError::Aggregation(format!(
            "overall score is not finite: {overall_score}"
        )));
    }

    // Bucketed on the displayed (rounded) score, not the continuous one: an
    // unrounded 9.46 shows as 9.5 and ranks in [1, 100], and a sum that lands
    // a hair under 9.0 through float error still ranks in [101, 1000].
    let world_ranking = world_ranking(overall_score, rng);

    Ok(AnalysisResult {
        world_ranking,
        overall_score,
        footwork_score: round1(means.footwork),
        technique_score: round1(means.technique),
        strategy_score: round1(means.strategy),
        fitness_score: round1(means.fitness),
        detailed_analysis: summarize(&means, records),
    })
}
