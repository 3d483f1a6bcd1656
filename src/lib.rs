pub mod config;
pub mod middleware;
pub mod routes {
    pub mod health;
    pub mod metrics;
    pub mod scan;
}
pub mod services {
    pub mod market_data;
    pub mod reference_cache;
    pub mod scan_engine;
    pub mod trigger;

    pub mod strategies {
        pub mod common;
        pub use common::{Candle, Direction};
        pub mod classifier;
        pub mod divergence;
        pub mod indicators;
        pub mod order_blocks;
        pub mod pivots;
        pub mod setups;
    }
}

pub mod utils;
