use dotenv::dotenv;
use std::env;

const DEFAULT_WATCHLIST: &str = "BTC-USD,ETH-USD,SOL-USD,ADA-USD,LINK-USD,DOT-USD,AVAX-USD";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub watchlist: Vec<String>,
    pub reference_asset: String,
    pub market_data_url: String,
    pub daily_period: String,
    pub hourly_period: String,
    pub scan_concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok(); // loads `.env` file automatically
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key → value source (env in production).
    pub fn from_lookup<F>(get: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_port = get("PORT")
            .or_else(|| get("SERVER_PORT"))
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|_| "PORT must be a valid u16")?
            .unwrap_or(5000);

        let watchlist = parse_watchlist(&get("WATCHLIST").unwrap_or_else(|| DEFAULT_WATCHLIST.into()));
        if watchlist.is_empty() {
            return Err("WATCHLIST must name at least one asset".into());
        }

        let reference_asset = get("REFERENCE_ASSET").unwrap_or_else(|| "BTC-USD".into());
        let market_data_url = get("MARKET_DATA_URL")
            .unwrap_or_else(|| "https://query1.finance.yahoo.com".into());
        let daily_period = get("DAILY_PERIOD").unwrap_or_else(|| "1y".into());
        let hourly_period = get("HOURLY_PERIOD").unwrap_or_else(|| "5d".into());

        let scan_concurrency = get("SCAN_CONCURRENCY")
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|_| "SCAN_CONCURRENCY must be a positive integer")?
            .unwrap_or(1);
        if scan_concurrency == 0 {
            return Err("SCAN_CONCURRENCY must be a positive integer".into());
        }

        let request_timeout_secs = get("REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|_| "REQUEST_TIMEOUT_SECS must be a valid u64")?
            .unwrap_or(15);

        Ok(Self {
            server_port,
            watchlist,
            reference_asset,
            market_data_url,
            daily_period,
            hourly_period,
            scan_concurrency,
            request_timeout_secs,
        })
    }
}

/// Comma-separated, order preserved, blanks and duplicates dropped.
pub fn parse_watchlist(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for asset in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let asset = asset.to_uppercase();
        if !out.contains(&asset) {
            out.push(asset);
        }
    }
    out
}
