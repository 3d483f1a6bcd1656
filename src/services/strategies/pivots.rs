//! Distance-constrained pivot detection on price and oscillator series.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::services::strategies::indicators::IndicatorSeries;
use crate::services::strategies::Candle;

/// Minimum index distance between two pivots of the same kind.
pub const MIN_SEPARATION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotMode {
    Trough,
    Peak,
}

impl PivotMode {
    fn more_extreme(self, candidate: f64, current: f64) -> bool {
        match self {
            PivotMode::Trough => candidate < current,
            PivotMode::Peak => candidate > current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    PriceLow,
    PriceHigh,
    OscillatorLow,
    OscillatorHigh,
}

impl PivotKind {
    pub fn mode(self) -> PivotMode {
        match self {
            PivotKind::PriceLow | PivotKind::OscillatorLow => PivotMode::Trough,
            PivotKind::PriceHigh | PivotKind::OscillatorHigh => PivotMode::Peak,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub index: usize,
    pub ts: DateTime<Utc>,
    pub value: f64,
    pub kind: PivotKind,
}

/// Indices of spaced local extrema, ascending.
///
/// A point qualifies when it is strictly more extreme than the available
/// value on each side; a flat run counts once, at its first index. Points
/// without a confirmed neighbour on both sides (series edges, gaps, an
/// unfinished tail) never qualify. Qualifying points are then kept most
/// extreme first, ties by earliest index, dropping any that fall within
/// `min_sep` of one already kept.
pub fn find_extrema(series: &[Option<f64>], mode: PivotMode, min_sep: usize) -> Vec<usize> {
    let sep = min_sep.max(1);
    if series.len() < sep {
        return Vec::new();
    }

    let mut ranked = local_extrema(series, mode);
    ranked.sort_by(|(ia, va), (ib, vb)| {
        let by_value = match mode {
            PivotMode::Trough => va.total_cmp(vb),
            PivotMode::Peak => vb.total_cmp(va),
        };
        by_value.then(ia.cmp(ib))
    });

    let mut kept: BTreeSet<usize> = BTreeSet::new();
    for (i, _) in ranked {
        let lo = i.saturating_sub(sep - 1);
        if kept.range(lo..i + sep).next().is_none() {
            kept.insert(i);
        }
    }
    kept.into_iter().collect()
}

fn local_extrema(series: &[Option<f64>], mode: PivotMode) -> Vec<(usize, f64)> {
    let mut out = Vec::new();
    let mut i = 1;
    while i + 1 < series.len() {
        let (Some(prev), Some(v)) = (series[i - 1], series[i]) else {
            i += 1;
            continue;
        };
        if !mode.more_extreme(v, prev) {
            i += 1;
            continue;
        }
        // walk to the end of a flat run
        let mut j = i + 1;
        while j < series.len() && series[j] == Some(v) {
            j += 1;
        }
        if let Some(next) = series.get(j).copied().flatten() {
            if mode.more_extreme(v, next) {
                out.push((i, v));
            }
        }
        i = j;
    }
    out
}

/// Runs [`find_extrema`] and attaches candle timestamps.
pub fn find_pivots(candles: &[Candle], series: &[Option<f64>], kind: PivotKind) -> Vec<Pivot> {
    find_extrema(series, kind.mode(), MIN_SEPARATION)
        .into_iter()
        .filter_map(|index| {
            Some(Pivot {
                index,
                ts: candles.get(index)?.ts,
                value: series[index]?,
                kind,
            })
        })
        .collect()
}

/// The four pivot sequences used by divergence and liquidity rules.
#[derive(Debug, Clone, Default)]
pub struct PivotSet {
    pub price_lows: Vec<Pivot>,
    pub price_highs: Vec<Pivot>,
    pub osc_lows: Vec<Pivot>,
    pub osc_highs: Vec<Pivot>,
}

impl PivotSet {
    pub fn detect(candles: &[Candle], ind: &IndicatorSeries) -> Self {
        let lows: Vec<Option<f64>> = candles.iter().map(|c| Some(c.low)).collect();
        let highs: Vec<Option<f64>> = candles.iter().map(|c| Some(c.high)).collect();
        Self {
            price_lows: find_pivots(candles, &lows, PivotKind::PriceLow),
            price_highs: find_pivots(candles, &highs, PivotKind::PriceHigh),
            osc_lows: find_pivots(candles, &ind.rsi, PivotKind::OscillatorLow),
            osc_highs: find_pivots(candles, &ind.rsi, PivotKind::OscillatorHigh),
        }
    }
}

/// Nearest pivot strictly before `index`.
pub fn last_before(pivots: &[Pivot], index: usize) -> Option<&Pivot> {
    let pos = pivots.partition_point(|p| p.index < index);
    pos.checked_sub(1).and_then(|i| pivots.get(i))
}

/// Nearest pivot at or after `index`.
pub fn first_at_or_after(pivots: &[Pivot], index: usize) -> Option<&Pivot> {
    let pos = pivots.partition_point(|p| p.index < index);
    pivots.get(pos)
}
