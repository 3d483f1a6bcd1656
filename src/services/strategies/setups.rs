//! Rule-based setup scanner for the daily timeframe.
//!
//! Rules look at the third-from-last (`a`), second-from-last (`p`) and last
//! candle, with the whole history available for pivot and order-block
//! lookups. Each firing rule adds one point to its side's score and appends a
//! candidate; the first candidate appended is the principal setup.

use chrono::NaiveDate;

use crate::services::strategies::divergence::DivergenceMap;
use crate::services::strategies::indicators::IndicatorSeries;
use crate::services::strategies::order_blocks::OrderBlocks;
use crate::services::strategies::pivots::{last_before, PivotSet};
use crate::services::strategies::{Candle, Direction};
use crate::utils::errors::SkipReason;

/// Fewest candles the rule set can be evaluated on at all.
pub const MIN_HISTORY: usize = 32;
/// Candles needed for the slow EMA, and so the trend filters, to exist.
pub const FULL_HISTORY: usize = 201;
pub const STOP_ATR_MULT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupKind {
    Spring,
    ObDivergenceBuy,
    LiquidityCapture,
    ObDivergenceSell,
}

impl SetupKind {
    pub fn direction(self) -> Direction {
        match self {
            SetupKind::Spring | SetupKind::ObDivergenceBuy => Direction::Bullish,
            SetupKind::LiquidityCapture | SetupKind::ObDivergenceSell => Direction::Bearish,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SetupKind::Spring => "COMPRA_SPRING",
            SetupKind::ObDivergenceBuy => "COMPRA_OB_DIVERGENCIA",
            SetupKind::LiquidityCapture => "VENDA_CAPTURA_LIQUIDEZ",
            SetupKind::ObDivergenceSell => "VENDA_OB_DIVERGENCIA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetupCandidate {
    pub kind: SetupKind,
    pub stop_base: f64,
    pub atr_at_detection: f64,
    pub direction: Direction,
}

/// Everything derived from one asset's daily history for a single scan.
#[derive(Debug, Clone)]
pub struct AssetContext<'a> {
    pub candles: &'a [Candle],
    pub ind: IndicatorSeries,
    pub pivots: PivotSet,
    pub blocks: OrderBlocks,
    pub divergence: DivergenceMap,
}

impl<'a> AssetContext<'a> {
    pub fn build(candles: &'a [Candle]) -> Self {
        let ind = IndicatorSeries::compute(candles);
        let pivots = PivotSet::detect(candles, &ind);
        let blocks = OrderBlocks::detect(candles);
        let divergence = DivergenceMap::detect(candles.len(), &pivots);
        Self {
            candles,
            ind,
            pivots,
            blocks,
            divergence,
        }
    }
}

/// Regime filters, evaluated once per asset on the last candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Regime {
    pub non_explosive: bool,
    pub uptrend: bool,
    pub downtrend: bool,
    pub market_ok: bool,
}

impl Regime {
    pub fn assess(ctx: &AssetContext<'_>, market_ok: bool) -> Self {
        let Some(last) = ctx.candles.len().checked_sub(1) else {
            return Self::default();
        };
        let close = ctx.candles[last].close;
        let non_explosive = match (ctx.ind.bb_width[last], ctx.ind.bb_width_avg[last]) {
            (Some(width), Some(avg)) => width < avg,
            _ => false,
        };
        let slow = ctx.ind.ema_slow[last];
        Self {
            non_explosive,
            uptrend: slow.is_some_and(|ema| close > ema),
            downtrend: slow.is_some_and(|ema| close < ema),
            market_ok,
        }
    }

    fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Bullish => self.uptrend && self.market_ok && self.non_explosive,
            Direction::Bearish => self.downtrend && self.non_explosive,
        }
    }
}

/// Outcome of the rule set for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupScan {
    pub candidates: Vec<SetupCandidate>,
    pub buy_score: u32,
    pub sell_score: u32,
    /// Date of the second-from-last candle, where the setup completes.
    pub setup_date: NaiveDate,
    pub atr: f64,
}

impl SetupScan {
    pub fn total_score(&self) -> u32 {
        self.buy_score + self.sell_score
    }

    /// First candidate appended in rule order. Later candidates never
    /// replace it, whatever their own parameters.
    pub fn principal(&self) -> Option<&SetupCandidate> {
        self.candidates.first()
    }

    /// Principal stop base pushed half an ATR away from the entry side.
    pub fn dynamic_stop(&self) -> Option<f64> {
        self.principal()
            .map(|c| c.stop_base - c.direction.sign() * STOP_ATR_MULT * c.atr_at_detection)
    }
}

/// Runs every rule against the context and tallies the scores.
pub fn scan_setups(ctx: &AssetContext<'_>, regime: &Regime) -> Result<SetupScan, SkipReason> {
    let n = ctx.candles.len();
    if n < MIN_HISTORY {
        return Err(SkipReason::InsufficientHistory { have: n, need: MIN_HISTORY });
    }
    let (a, p) = (n - 3, n - 2);
    let atr = ctx.ind.atr[p].ok_or(SkipReason::IndicatorUnavailable("atr"))?;

    let rules: [(SetupKind, fn(&AssetContext<'_>, usize, usize) -> Option<f64>); 4] = [
        (SetupKind::Spring, spring),
        (SetupKind::ObDivergenceBuy, ob_divergence_buy),
        (SetupKind::LiquidityCapture, liquidity_capture),
        (SetupKind::ObDivergenceSell, ob_divergence_sell),
    ];

    let mut scan = SetupScan {
        candidates: Vec::new(),
        buy_score: 0,
        sell_score: 0,
        setup_date: ctx.candles[p].date(),
        atr,
    };

    for (kind, rule) in rules {
        let direction = kind.direction();
        if !regime.allows(direction) {
            continue;
        }
        let Some(stop_base) = rule(ctx, a, p) else { continue };
        match direction {
            Direction::Bullish => scan.buy_score += 1,
            Direction::Bearish => scan.sell_score += 1,
        }
        scan.candidates.push(SetupCandidate {
            kind,
            stop_base,
            atr_at_detection: atr,
            direction,
        });
    }

    Ok(scan)
}

// ============================================================
// Rules – each returns the stop base when it fires
// ============================================================

fn volume_expands(ctx: &AssetContext<'_>, i: usize) -> bool {
    ctx.ind.volume_avg[i].is_some_and(|avg| ctx.candles[i].volume > avg)
}

/// False break below the 30-period range low, reclaimed on expanding volume.
fn spring(ctx: &AssetContext<'_>, a: usize, p: usize) -> Option<f64> {
    // support as it stood before the breaking candle
    let support = ctx.ind.range_low[a.checked_sub(1)?]?;
    let (brk, reclaim) = (ctx.candles[a], ctx.candles[p]);
    (brk.low < support && reclaim.close > support && volume_expands(ctx, p)).then_some(brk.low)
}

fn ob_divergence_buy(ctx: &AssetContext<'_>, a: usize, p: usize) -> Option<f64> {
    let block = ctx.blocks.nearest_before(a, Direction::Bullish)?;
    let low = ctx.candles[p].low;
    let retest = block.low <= low && low <= block.high;
    (retest && ctx.divergence.is_active(p, Direction::Bullish)).then_some(block.low)
}

/// Stop-run above the last swing high that closes back below it.
fn liquidity_capture(ctx: &AssetContext<'_>, a: usize, p: usize) -> Option<f64> {
    let swing = last_before(&ctx.pivots.price_highs, a)?;
    let (run, back) = (ctx.candles[a], ctx.candles[p]);
    (run.high > swing.value && back.close < swing.value && volume_expands(ctx, p)).then_some(run.high)
}

fn ob_divergence_sell(ctx: &AssetContext<'_>, a: usize, p: usize) -> Option<f64> {
    let block = ctx.blocks.nearest_before(a, Direction::Bearish)?;
    let high = ctx.candles[p].high;
    let retest = block.low <= high && high <= block.high;
    (retest && ctx.divergence.is_active(p, Direction::Bearish)).then_some(block.high)
}
