//! Order-block flags: the candle right before a strong breakout candle.

use crate::services::strategies::{Candle, Direction};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderBlock {
    pub index: usize,
    pub low: f64,
    pub high: f64,
    pub direction: Direction,
}

/// Flagged candles in index order.
#[derive(Debug, Clone, Default)]
pub struct OrderBlocks {
    blocks: Vec<OrderBlock>,
}

impl OrderBlocks {
    pub fn detect(candles: &[Candle]) -> Self {
        let mut blocks = Vec::new();

        for (i, pair) in candles.windows(2).enumerate() {
            let (base, breakout) = (pair[0], pair[1]);
            let direction = if base.is_down() && breakout.close > base.high {
                Direction::Bullish
            } else if base.is_up() && breakout.close < base.low {
                Direction::Bearish
            } else {
                continue;
            };
            // flag lives on the earlier candle
            blocks.push(OrderBlock {
                index: i,
                low: base.low,
                high: base.high,
                direction,
            });
        }

        Self { blocks }
    }

    #[cfg(test)]
    fn flag(&self, index: usize) -> Option<Direction> {
        let pos = self.blocks.partition_point(|b| b.index < index);
        self.blocks.get(pos).filter(|b| b.index == index).map(|b| b.direction)
    }

    /// Nearest block of `direction` strictly before `index`.
    pub fn nearest_before(&self, index: usize, direction: Direction) -> Option<&OrderBlock> {
        let pos = self.blocks.partition_point(|b| b.index < index);
        self.blocks[..pos]
            .iter()
            .rev()
            .find(|b| b.direction == direction)
    }
}
