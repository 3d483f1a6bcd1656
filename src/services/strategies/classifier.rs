//! Maps a setup scan to a confidence tier and builds the reported result.
//!
//! ```text
//! score 0   → NO_SIGNAL          (nothing reported)
//! score 1   → UNDER_OBSERVATION  (no trigger search)
//! score ≥ 2 → trigger search ─┬─ hit  → CONFIRMED
//!                             └─ miss → AWAITING_TRIGGER
//! ```

use serde::Serialize;

use crate::services::strategies::setups::SetupScan;
use crate::services::strategies::Direction;
use crate::services::trigger::TriggerHit;

pub const CONFIRMATION_THRESHOLD: u32 = 2;
pub const REWARD_MULTIPLE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    NoSignal,
    UnderObservation,
    Confirmable,
}

pub fn tier(total_score: u32) -> Tier {
    match total_score {
        0 => Tier::NoSignal,
        s if s < CONFIRMATION_THRESHOLD => Tier::UnderObservation,
        _ => Tier::Confirmable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Confirmed,
    AwaitingTrigger,
    UnderObservation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    #[serde(rename = "ativo")]
    pub asset: String,
    pub status: SignalStatus,
    #[serde(rename = "estrategia")]
    pub label: String,
    pub score: u32,
    pub stop: f64,
    #[serde(rename = "entrada", skip_serializing_if = "Option::is_none")]
    pub entry: Option<f64>,
    #[serde(rename = "alvo", skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(rename = "hora_gatilho", skip_serializing_if = "Option::is_none")]
    pub trigger_time: Option<String>,
    #[serde(rename = "data_setup", skip_serializing_if = "Option::is_none")]
    pub setup_date: Option<String>,
}

/// `entry ± 3·|entry − stop|` on the trade's side.
pub fn target_for(entry: f64, stop: f64, direction: Direction) -> f64 {
    let risk = (entry - stop).abs();
    entry + direction.sign() * REWARD_MULTIPLE * risk
}

fn base(asset: &str, scan: &SetupScan, status: SignalStatus) -> Option<ScanResult> {
    let principal = scan.principal()?;
    Some(ScanResult {
        asset: asset.to_string(),
        status,
        label: principal.kind.label().to_string(),
        score: scan.total_score(),
        stop: scan.dynamic_stop()?,
        entry: None,
        target: None,
        trigger_time: None,
        setup_date: Some(scan.setup_date.format("%Y-%m-%d").to_string()),
    })
}

/// Single-rule setups: reported with stop, score and date only.
pub fn observe(asset: &str, scan: &SetupScan) -> Option<ScanResult> {
    base(asset, scan, SignalStatus::UnderObservation)
}

/// Confirmable setups, with or without an hourly trigger.
pub fn resolve(asset: &str, scan: &SetupScan, hit: Option<TriggerHit>) -> Option<ScanResult> {
    let Some(hit) = hit else {
        return base(asset, scan, SignalStatus::AwaitingTrigger);
    };
    let mut result = base(asset, scan, SignalStatus::Confirmed)?;
    let direction = scan.principal()?.direction;
    result.label.push_str("_MTF");
    result.entry = Some(hit.entry);
    result.target = Some(target_for(hit.entry, result.stop, direction));
    result.trigger_time = Some(hit.ts.format("%Y-%m-%d %H:%M").to_string());
    Some(result)
}
