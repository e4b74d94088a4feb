//! Step count ranges
//!
//! Accounts carry a range from which each run draws the submitted step
//! count. A range is written either as `min-max` or as a single value that
//! is widened by 2000 in both directions.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

const SINGLE_VALUE_SPREAD: u32 = 2000;
const SINGLE_VALUE_FLOOR: u32 = 5000;

/// Inclusive range of step counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRange {
    min: u32,
    max: u32,
}

/// Range used when an account has no range or an unreadable one
pub const DEFAULT_STEP_RANGE: StepRange = StepRange {
    min: 8000,
    max: 25000,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepRangeError {
    #[error("step range is empty")]
    Empty,

    #[error("`{0}` is not a step count")]
    NotANumber(String),

    #[error("step range {min}-{max} is not ordered or contains zero")]
    Invalid { min: u32, max: u32 },
}

impl StepRange {
    pub fn new(min: u32, max: u32) -> Result<Self, StepRangeError> {
        if min == 0 || min > max {
            return Err(StepRangeError::Invalid { min, max });
        }
        Ok(Self { min, max })
    }

    /// Widen a single target into `target ± 2000`, never starting below 5000
    pub fn around(target: u32) -> Result<Self, StepRangeError> {
        if target == 0 {
            return Err(StepRangeError::Invalid { min: 0, max: 0 });
        }
        let min = target.saturating_sub(SINGLE_VALUE_SPREAD).max(SINGLE_VALUE_FLOOR);
        let max = target.saturating_add(SINGLE_VALUE_SPREAD).max(min);
        Ok(Self { min, max })
    }

    /// Parse `input`, falling back to [`DEFAULT_STEP_RANGE`] when it is
    /// missing or malformed
    pub fn parse_or_default(input: Option<&str>) -> Self {
        input
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_STEP_RANGE)
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, steps: u32) -> bool {
        (self.min..=self.max).contains(&steps)
    }

    /// Draw a step count uniformly from the range
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for StepRange {
    fn default() -> Self {
        DEFAULT_STEP_RANGE
    }
}

fn parse_count(raw: &str) -> Result<u32, StepRangeError> {
    let trimmed = raw.trim();
    trimmed
        .parse()
        .map_err(|_| StepRangeError::NotANumber(trimmed.to_string()))
}

impl FromStr for StepRange {
    type Err = StepRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StepRangeError::Empty);
        }

        match s.split_once('-') {
            Some((min, max)) => StepRange::new(parse_count(min)?, parse_count(max)?),
            None => StepRange::around(parse_count(s)?),
        }
    }
}

impl fmt::Display for StepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Step setting as written in configuration: `"15000-20000"`, `"18000"` or `18000`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StepSetting {
    Count(u32),
    Text(String),
}

impl StepSetting {
    pub fn to_range(&self) -> Result<StepRange, StepRangeError> {
        match self {
            StepSetting::Count(target) => StepRange::around(*target),
            StepSetting::Text(text) => text.parse(),
        }
    }
}
