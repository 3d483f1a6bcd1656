// src/services/strategies/common.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts:     DateTime<Utc>,
    pub open:   f64,
    pub high:   f64,
    pub low:    f64,
    pub close:  f64,
    pub volume: f64,
}

impl Candle {
    pub fn date(&self) -> NaiveDate {
        self.ts.date_naive()
    }

    pub fn is_down(&self) -> bool {
        self.close < self.open
    }

    pub fn is_up(&self) -> bool {
        self.close > self.open
    }
}

/// Trade direction of a setup, divergence or order block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    /// `+1` for bullish, `-1` for bearish; used to offset stops and targets.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
        }
    }
}
