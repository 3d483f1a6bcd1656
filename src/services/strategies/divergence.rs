//! Momentum divergence between price pivots and RSI pivots.
//!
//! Bullish: a lower price low whose surrounding oscillator lows rise.
//! Bearish: a higher price high whose surrounding oscillator highs fall.
//! Each hit opens a fixed window starting at the later price pivot.

use crate::services::strategies::pivots::{first_at_or_after, last_before, Pivot, PivotSet};
use crate::services::strategies::Direction;

pub const WINDOW_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivergenceWindow {
    pub start: usize,
    pub direction: Direction,
}

impl DivergenceWindow {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + WINDOW_LEN
    }
}

/// Windows in detection order (bullish pass, then bearish pass).
pub fn find_windows(pivots: &PivotSet) -> Vec<DivergenceWindow> {
    let mut out = scan_pairs(&pivots.price_lows, &pivots.osc_lows, Direction::Bullish);
    out.extend(scan_pairs(&pivots.price_highs, &pivots.osc_highs, Direction::Bearish));
    out
}

fn scan_pairs(price: &[Pivot], osc: &[Pivot], direction: Direction) -> Vec<DivergenceWindow> {
    price
        .windows(2)
        .filter_map(|pair| {
            let (former, later) = (pair[0], pair[1]);
            let price_extends = match direction {
                Direction::Bullish => later.value < former.value,
                Direction::Bearish => later.value > former.value,
            };
            if !price_extends {
                return None;
            }

            let before = last_before(osc, later.index)?;
            let after = first_at_or_after(osc, later.index)?;
            let osc_disagrees = match direction {
                Direction::Bullish => after.value > before.value,
                Direction::Bearish => after.value < before.value,
            };
            osc_disagrees.then_some(DivergenceWindow {
                start: later.index,
                direction,
            })
        })
        .collect()
}

/// Per-index divergence state. Later windows overwrite earlier ones where
/// they overlap; windows are clipped to the series length.
#[derive(Debug, Clone, Default)]
pub struct DivergenceMap {
    marks: Vec<Option<Direction>>,
}

impl DivergenceMap {
    pub fn build(len: usize, windows: &[DivergenceWindow]) -> Self {
        let mut marks = vec![None; len];
        for w in windows {
            let end = w.range().end.min(len);
            for slot in marks.iter_mut().take(end).skip(w.start) {
                *slot = Some(w.direction);
            }
        }
        Self { marks }
    }

    pub fn detect(len: usize, pivots: &PivotSet) -> Self {
        Self::build(len, &find_windows(pivots))
    }

    pub fn at(&self, index: usize) -> Option<Direction> {
        self.marks.get(index).copied().flatten()
    }

    pub fn is_active(&self, index: usize, direction: Direction) -> bool {
        self.at(index) == Some(direction)
    }
}

// =======================================================================
// UNIT TESTS
// =======================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategies::indicators::IndicatorSeries;
    use crate::services::strategies::pivots::PivotKind;
    use crate::services::strategies::Candle;
    use chrono::{Duration, TimeZone, Utc};

    fn pv(index: usize, value: f64, kind: PivotKind) -> Pivot {
        Pivot { index, ts: Utc::now(), value, kind }
    }

    fn lows(price: &[(usize, f64)], osc: &[(usize, f64)]) -> PivotSet {
        PivotSet {
            price_lows: price.iter().map(|&(i, v)| pv(i, v, PivotKind::PriceLow)).collect(),
            osc_lows: osc.iter().map(|&(i, v)| pv(i, v, PivotKind::OscillatorLow)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn lower_low_with_higher_rsi_low_is_bullish() {
        let set = lows(&[(20, 100.0), (40, 90.0)], &[(18, 25.0), (41, 35.0)]);
        let windows = find_windows(&set);
        assert_eq!(windows, vec![DivergenceWindow { start: 40, direction: Direction::Bullish }]);
        assert_eq!(windows[0].range().len(), WINDOW_LEN);

        let map = DivergenceMap::build(60, &windows);
        assert!(!map.is_active(39, Direction::Bullish));
        assert!(map.is_active(40, Direction::Bullish));
        assert!(map.is_active(49, Direction::Bullish));
        assert!(!map.is_active(50, Direction::Bullish));
    }

    #[test]
    fn equal_rsi_lows_do_not_diverge() {
        let set = lows(&[(20, 100.0), (40, 90.0)], &[(18, 30.0), (40, 30.0)]);
        assert!(find_windows(&set).is_empty());
    }

    #[test]
    fn higher_price_low_is_ignored() {
        let set = lows(&[(20, 90.0), (40, 100.0)], &[(18, 25.0), (41, 35.0)]);
        assert!(find_windows(&set).is_empty());
    }

    #[test]
    fn missing_oscillator_side_skips_pair() {
        // nothing at or after index 40
        let set = lows(&[(20, 100.0), (40, 90.0)], &[(18, 25.0), (30, 35.0)]);
        assert!(find_windows(&set).is_empty());
        // nothing strictly before index 40
        let set = lows(&[(20, 100.0), (40, 90.0)], &[(40, 35.0)]);
        assert!(find_windows(&set).is_empty());
    }

    #[test]
    fn bearish_mirror() {
        let set = PivotSet {
            price_highs: vec![pv(10, 100.0, PivotKind::PriceHigh), pv(30, 110.0, PivotKind::PriceHigh)],
            osc_highs: vec![pv(12, 80.0, PivotKind::OscillatorHigh), pv(31, 65.0, PivotKind::OscillatorHigh)],
            ..Default::default()
        };
        let windows = find_windows(&set);
        assert_eq!(windows, vec![DivergenceWindow { start: 30, direction: Direction::Bearish }]);
    }

    #[test]
    fn later_window_overrides_overlap_and_clips_at_end() {
        let windows = [
            DivergenceWindow { start: 0, direction: Direction::Bullish },
            DivergenceWindow { start: 5, direction: Direction::Bearish },
        ];
        let map = DivergenceMap::build(12, &windows);
        assert_eq!(map.at(4), Some(Direction::Bullish));
        assert_eq!(map.at(5), Some(Direction::Bearish));
        assert_eq!(map.at(11), Some(Direction::Bearish));
        assert_eq!(map.at(12), None);
    }

    //------------------------------------------------------------------
    // From candles through indicator and pivot detection
    //------------------------------------------------------------------

    /// Slow climb, a four-bar flush to 88, a long grind back to 100, then a
    /// faster four-bar drop to 86 and a recovery. The second flush makes the
    /// lower low on a much less oversold RSI.
    fn flush_closes() -> Vec<f64> {
        (0..=70)
            .map(|i| match i {
                0..=20 => 100.0 + 0.2 * i as f64,
                21..=24 => 104.0 - 4.0 * (i - 20) as f64,
                25..=54 => 88.0 + 0.4 * (i - 24) as f64,
                55..=58 => 100.0 - 3.5 * (i - 54) as f64,
                _ => 86.0 + 0.5 * (i - 58) as f64,
            })
            .collect()
    }

    fn bars(closes: &[f64]) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                ts: t0 + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn detect_on(candles: &[Candle]) -> (PivotSet, DivergenceMap) {
        let ind = IndicatorSeries::compute(candles);
        let pivots = PivotSet::detect(candles, &ind);
        let map = DivergenceMap::detect(candles.len(), &pivots);
        (pivots, map)
    }

    fn indices(pivots: &[Pivot]) -> Vec<usize> {
        pivots.iter().map(|p| p.index).collect()
    }

    #[test]
    fn candles_with_lower_low_and_higher_rsi_low_open_bullish_window() {
        let c = bars(&flush_closes());
        let (pivots, map) = detect_on(&c);

        assert_eq!(indices(&pivots.price_lows), vec![24, 58]);
        assert_eq!(indices(&pivots.osc_lows), vec![24, 58]);
        assert!(pivots.osc_lows[1].value > pivots.osc_lows[0].value);

        assert_eq!(map.at(57), None);
        assert!(map.is_active(58, Direction::Bullish));
        assert!(map.is_active(67, Direction::Bullish));
        assert_eq!(map.at(68), None);
    }

    #[test]
    fn mirrored_candles_open_bearish_window() {
        let mirrored: Vec<f64> = flush_closes().iter().map(|c| 200.0 - c).collect();
        let c = bars(&mirrored);
        let (pivots, map) = detect_on(&c);

        assert_eq!(indices(&pivots.price_highs), vec![24, 58]);
        assert_eq!(indices(&pivots.osc_highs), vec![24, 58]);
        assert!(pivots.osc_highs[1].value < pivots.osc_highs[0].value);

        assert!(map.is_active(58, Direction::Bearish));
        assert!(map.is_active(67, Direction::Bearish));
        assert!(!map.is_active(58, Direction::Bullish));
    }
}
