//! Learner position estimate used to pick a conversation difficulty.
//!
//! The composite score is a weighted heuristic over assessment sub-scores
//! plus a small consistency bonus. It is not normed against any population
//! and must not be shown to learners as a percentile or test-equivalent.

use serde::{Deserialize, Serialize};

const GRAMMAR_WEIGHT: f64 = 0.25;
const VOCABULARY_WEIGHT: f64 = 0.30;
const FLUENCY_WEIGHT: f64 = 0.25;
const COMPREHENSION_WEIGHT: f64 = 0.20;

const BONUS_PER_SESSION: f64 = 0.25;
const MAX_CONSISTENCY_BONUS: f64 = 10.0;
const MIN_COMPOSITE: f64 = 10.0;
const MAX_COMPOSITE: f64 = 100.0;
const UNKNOWN_GRADE_SCORE: f64 = 50.0;

const GRADE_SCORES: [(&str, f64); 8] = [
    ("k", 25.0),
    ("1-2", 35.0),
    ("3-4", 45.0),
    ("5-6", 52.0),
    ("7-8", 60.0),
    ("9-10", 68.0),
    ("11-12", 76.0),
    ("college", 84.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDetails {
    pub grammar: f64,
    pub vocabulary: f64,
    pub fluency: f64,
    pub comprehension: f64,
}

impl LevelDetails {
    pub fn weighted_score(&self) -> f64 {
        GRAMMAR_WEIGHT * clamp_sub_score(self.grammar)
            + VOCABULARY_WEIGHT * clamp_sub_score(self.vocabulary)
            + FLUENCY_WEIGHT * clamp_sub_score(self.fluency)
            + COMPREHENSION_WEIGHT * clamp_sub_score(self.comprehension)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyPreference {
    Easy,
    Medium,
    Hard,
}

impl DifficultyPreference {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn tier(&self) -> u8 {
        match self {
            Self::Easy => 2,
            Self::Medium => 3,
            Self::Hard => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityBand {
    Beginner,
    Elementary,
    Intermediate,
    #[serde(rename = "Intermediate-High")]
    IntermediateHigh,
    Advanced,
}

impl AbilityBand {
    pub fn from_score(score: u32) -> Self {
        match score {
            85.. => Self::Advanced,
            70..=84 => Self::IntermediateHigh,
            50..=69 => Self::Intermediate,
            30..=49 => Self::Elementary,
            _ => Self::Beginner,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Elementary => "Elementary",
            Self::Intermediate => "Intermediate",
            Self::IntermediateHigh => "Intermediate-High",
            Self::Advanced => "Advanced",
        }
    }
}

/// Raw signals for one learner. Sub-scores win over the grade label when
/// both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSnapshot {
    #[serde(default)]
    pub level_details: Option<LevelDetails>,
    #[serde(default)]
    pub current_level: Option<String>,
    #[serde(default)]
    pub session_count: i64,
    #[serde(default)]
    pub difficulty_preference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPosition {
    pub composite_score: u32,
    pub band: AbilityBand,
    pub target_difficulty: u8,
    pub detail_score: f64,
    pub consistency_bonus: f64,
}

pub fn estimate(snapshot: &LearningSnapshot) -> LearningPosition {
    let detail_score = match &snapshot.level_details {
        Some(details) => details.weighted_score(),
        None => grade_score(snapshot.current_level.as_deref()),
    };
    let consistency_bonus = consistency_bonus(snapshot.session_count);
    let composite_score = (detail_score + consistency_bonus)
        .round()
        .clamp(MIN_COMPOSITE, MAX_COMPOSITE) as u32;

    let preference = snapshot
        .difficulty_preference
        .as_deref()
        .and_then(DifficultyPreference::parse);
    let target_difficulty = match preference {
        Some(pref) => pref.tier(),
        None => difficulty_for_score(composite_score),
    };

    let position = LearningPosition {
        composite_score,
        band: AbilityBand::from_score(composite_score),
        target_difficulty,
        detail_score,
        consistency_bonus,
    };
    tracing::debug!(
        composite_score,
        band = position.band.label(),
        target_difficulty,
        "learning position estimated"
    );
    position
}

pub fn grade_score(level: Option<&str>) -> f64 {
    let Some(level) = level else {
        return UNKNOWN_GRADE_SCORE;
    };
    let normalized = level.trim().to_lowercase();
    GRADE_SCORES
        .iter()
        .find(|(grade, _)| *grade == normalized)
        .map(|(_, score)| *score)
        .unwrap_or(UNKNOWN_GRADE_SCORE)
}

pub fn consistency_bonus(session_count: i64) -> f64 {
    (session_count.max(0) as f64 * BONUS_PER_SESSION).min(MAX_CONSISTENCY_BONUS)
}

pub fn difficulty_for_score(composite_score: u32) -> u8 {
    if composite_score >= 85 {
        4
    } else if composite_score >= 60 {
        3
    } else {
        2
    }
}

fn clamp_sub_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(g: f64, v: f64, f: f64, c: f64) -> Option<LevelDetails> {
        Some(LevelDetails {
            grammar: g,
            vocabulary: v,
            fluency: f,
            comprehension: c,
        })
    }

    #[test]
    fn test_uniform_sub_scores() {
        let snapshot = LearningSnapshot {
            level_details: details(80.0, 80.0, 80.0, 80.0),
            ..Default::default()
        };
        let position = estimate(&snapshot);
        assert_eq!(position.composite_score, 80);
        assert_eq!(position.band, AbilityBand::IntermediateHigh);
        assert_eq!(position.target_difficulty, 3);
    }

    #[test]
    fn test_preference_overrides_derived_difficulty() {
        let snapshot = LearningSnapshot {
            level_details: details(80.0, 80.0, 80.0, 80.0),
            difficulty_preference: Some("hard".to_string()),
            ..Default::default()
        };
        assert_eq!(estimate(&snapshot).target_difficulty, 4);

        let snapshot = LearningSnapshot {
            level_details: details(95.0, 95.0, 95.0, 95.0),
            difficulty_preference: Some("Easy".to_string()),
            ..Default::default()
        };
        assert_eq!(estimate(&snapshot).target_difficulty, 2);
    }

    #[test]
    fn test_grade_fallback_with_full_bonus() {
        let snapshot = LearningSnapshot {
            current_level: Some("9-10".to_string()),
            session_count: 40,
            ..Default::default()
        };
        let position = estimate(&snapshot);
        assert!((position.detail_score - 68.0).abs() < 1e-12);
        assert!((position.consistency_bonus - 10.0).abs() < 1e-12);
        assert_eq!(position.composite_score, 78);
    }

    #[test]
    fn test_vocabulary_weighted_highest() {
        let vocab_heavy = details(0.0, 100.0, 0.0, 0.0).unwrap().weighted_score();
        let grammar_heavy = details(100.0, 0.0, 0.0, 0.0).unwrap().weighted_score();
        assert!(vocab_heavy > grammar_heavy);
        assert!((details(100.0, 100.0, 100.0, 100.0).unwrap().weighted_score() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_grade_table() {
        assert_eq!(grade_score(Some("K")), 25.0);
        assert_eq!(grade_score(Some(" college ")), 84.0);
        assert_eq!(grade_score(Some("graduate")), UNKNOWN_GRADE_SCORE);
        assert_eq!(grade_score(None), UNKNOWN_GRADE_SCORE);
    }

    #[test]
    fn test_inputs_are_coerced() {
        assert_eq!(consistency_bonus(-12), 0.0);
        assert_eq!(consistency_bonus(1000), 10.0);

        let snapshot = LearningSnapshot {
            level_details: details(-40.0, f64::NAN, 0.0, 0.0),
            session_count: -3,
            difficulty_preference: Some("impossible".to_string()),
            ..Default::default()
        };
        let position = estimate(&snapshot);
        assert_eq!(position.composite_score, 10);
        assert_eq!(position.band, AbilityBand::Beginner);
        assert_eq!(position.target_difficulty, 2);
    }

    #[test]
    fn test_band_cut_points() {
        assert_eq!(AbilityBand::from_score(85), AbilityBand::Advanced);
        assert_eq!(AbilityBand::from_score(84), AbilityBand::IntermediateHigh);
        assert_eq!(AbilityBand::from_score(70), AbilityBand::IntermediateHigh);
        assert_eq!(AbilityBand::from_score(50), AbilityBand::Intermediate);
        assert_eq!(AbilityBand::from_score(30), AbilityBand::Elementary);
        assert_eq!(AbilityBand::from_score(29), AbilityBand::Beginner);
        assert_eq!(difficulty_for_score(85), 4);
        assert_eq!(difficulty_for_score(60), 3);
        assert_eq!(difficulty_for_score(59), 2);
    }

    #[test]
    fn test_band_serializes_with_label() {
        let json = serde_json::to_string(&AbilityBand::IntermediateHigh).unwrap();
        assert_eq!(json, "\"Intermediate-High\"");
        assert_eq!(AbilityBand::Advanced.label(), "Advanced");
    }
}
