use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MAX_INTERVAL_DAYS: u32 = 180;
pub const MAX_QUALITY: i32 = 5;
pub const PASSING_QUALITY: u8 = 3;
pub const LADDER_DAYS: [u32; 8] = [1, 3, 7, 14, 30, 60, 90, 180];

const FAST_RT_MS: i64 = 2000;
const MEDIUM_RT_MS: i64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Active,
    Mastered,
    Difficult,
}

impl ReviewStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "mastered" => Some(Self::Mastered),
            "difficult" => Some(Self::Difficult),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Mastered => "mastered",
            Self::Difficult => "difficult",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    #[default]
    Sm2,
    Ladder,
}

/// Scheduling inputs as persisted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
        }
    }
}

impl ReviewState {
    /// Coerces stored values into the valid domain. Non-finite ease falls
    /// back to the default, anything under the floor is raised to it.
    pub fn normalized(&self) -> Self {
        let ease_factor = if self.ease_factor.is_finite() {
            self.ease_factor.max(MIN_EASE_FACTOR)
        } else {
            DEFAULT_EASE_FACTOR
        };
        Self {
            repetitions: self.repetitions,
            ease_factor,
            interval_days: self.interval_days.clamp(1, MAX_INTERVAL_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub quality_rating: u8,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub next_review_at: DateTime<Utc>,
}

impl ReviewRecord {
    /// Always recomputed; a stored status is never authoritative.
    pub fn status(&self) -> ReviewStatus {
        review_status(self.repetitions, self.ease_factor, self.interval_days)
    }

    pub fn state(&self) -> ReviewState {
        ReviewState {
            repetitions: self.repetitions,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_review_at
    }
}

pub fn review_status(repetitions: u32, ease_factor: f64, interval_days: u32) -> ReviewStatus {
    if repetitions >= 5 && interval_days >= 30 {
        ReviewStatus::Mastered
    } else if ease_factor < 1.8 || (repetitions > 3 && interval_days <= 3) {
        ReviewStatus::Difficult
    } else {
        ReviewStatus::Active
    }
}

pub fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(0, MAX_QUALITY) as u8
}

/// Maps a graded answer onto the 0-5 recall scale. Slow correct answers
/// count as hesitant recall.
pub fn quality_from_answer(is_correct: bool, response_time_ms: i64) -> u8 {
    if !is_correct {
        return 1;
    }
    if response_time_ms < FAST_RT_MS {
        5
    } else if response_time_ms < MEDIUM_RT_MS {
        4
    } else {
        3
    }
}

pub fn next_ease_factor(ease_factor: f64, quality: u8) -> f64 {
    let miss = (MAX_QUALITY as f64) - quality as f64;
    (ease_factor + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASE_FACTOR)
}

impl SchedulerKind {
    pub fn schedule(&self, quality: i32, state: &ReviewState) -> ReviewRecord {
        self.schedule_at(quality, state, Utc::now())
    }

    pub fn schedule_at(&self, quality: i32, state: &ReviewState, now: DateTime<Utc>) -> ReviewRecord {
        match self {
            Self::Sm2 => sm2_schedule_at(quality, state, now),
            Self::Ladder => ladder_schedule_at(quality, state, now),
        }
    }
}

pub fn schedule(quality: i32, state: &ReviewState) -> ReviewRecord {
    sm2_schedule_at(quality, state, Utc::now())
}

/// SM-2 step. The interval for the third and later successes uses the ease
/// factor the item had going into this review.
pub fn sm2_schedule_at(quality: i32, state: &ReviewState, now: DateTime<Utc>) -> ReviewRecord {
    let quality = clamp_quality(quality);
    let state = state.normalized();

    let (repetitions, ease_factor, interval_days) = if quality < PASSING_QUALITY {
        (0, state.ease_factor, 1)
    } else {
        let repetitions = state.repetitions.saturating_add(1);
        let interval = match repetitions {
            1 => 1,
            2 => 3,
            _ => {
                let grown = (state.interval_days as f64 * state.ease_factor).round();
                grown.min(MAX_INTERVAL_DAYS as f64) as u32
            }
        };
        (repetitions, next_ease_factor(state.ease_factor, quality), interval)
    };

    build_record(quality, repetitions, ease_factor, interval_days, now)
}

pub fn ladder_schedule_at(quality: i32, state: &ReviewState, now: DateTime<Utc>) -> ReviewRecord {
    let quality = clamp_quality(quality);
    let state = state.normalized();

    let (repetitions, interval_days) = if quality < PASSING_QUALITY {
        (0, 1)
    } else {
        (
            state.repetitions.saturating_add(1),
            next_ladder_interval(state.interval_days),
        )
    };

    build_record(quality, repetitions, state.ease_factor, interval_days, now)
}

/// Rung after the first rung at or above `current`; saturates at the top.
pub fn next_ladder_interval(current: u32) -> u32 {
    let last = LADDER_DAYS.len() - 1;
    match LADDER_DAYS.iter().position(|&days| days >= current) {
        Some(idx) => LADDER_DAYS[(idx + 1).min(last)],
        None => LADDER_DAYS[last],
    }
}

fn build_record(
    quality: u8,
    repetitions: u32,
    ease_factor: f64,
    interval_days: u32,
    now: DateTime<Utc>,
) -> ReviewRecord {
    let interval_days = interval_days.clamp(1, MAX_INTERVAL_DAYS);
    ReviewRecord {
        quality_rating: quality,
        repetitions,
        ease_factor,
        interval_days,
        next_review_at: now + Duration::days(interval_days as i64),
    }
}
