//! Market-data collaborator for the scanner.
//! -----------------------------------------------------------------
//! ‣ `MarketDataProvider` is the seam the scan engine talks to.
//! ‣ `YahooChartProvider` is the production adapter (chart REST API).
//! ‣ No retries here; a failed fetch simply skips the asset upstream.
//! -----------------------------------------------------------------

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::services::strategies::Candle;
use crate::utils::errors::ProviderError;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; signal-scanner/0.1)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Daily,
    Hourly,
}

impl Resolution {
    pub fn as_interval(self) -> &'static str {
        match self {
            Resolution::Daily => "1d",
            Resolution::Hourly => "1h",
        }
    }
}

/// Ordered OHLCV history for one asset.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_candles(
        &self,
        asset: &str,
        period: &str,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, ProviderError>;
}

/* ─────────────────────────────────────────  Yahoo chart API ────── */

pub struct YahooChartProvider {
    http: Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartProvider {
    async fn fetch_candles(
        &self,
        asset: &str,
        period: &str,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, asset);
        let resp = self
            .http
            .get(&url)
            .query(&[("range", period), ("interval", resolution.as_interval())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        // error payloads come back as chart envelopes too
        let envelope: ChartEnvelope = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(_) if !status.is_success() => return Err(ProviderError::Status(status.as_u16())),
            Err(e) => return Err(e.into()),
        };
        if !status.is_success() && envelope.chart.error.is_none() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let candles = candles_from_chart(envelope)?;
        log::debug!("{asset} {}: {} candles", resolution.as_interval(), candles.len());
        if candles.is_empty() {
            return Err(ProviderError::Empty(asset.to_string()));
        }
        Ok(candles)
    }
}

/* ─────────────────────────────────────────  Chart structs ─ */

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartQuote {
    fn row(&self, i: usize) -> Option<(f64, f64, f64, f64, f64)> {
        Some((
            (*self.open.get(i)?)?,
            (*self.high.get(i)?)?,
            (*self.low.get(i)?)?,
            (*self.close.get(i)?)?,
            (*self.volume.get(i)?)?,
        ))
    }
}

/// Rows with any null field are dropped; output timestamps strictly increase.
fn candles_from_chart(envelope: ChartEnvelope) -> Result<Vec<Candle>, ProviderError> {
    if let Some(err) = envelope.chart.error {
        return Err(ProviderError::Upstream(format!("{}: {}", err.code, err.description)));
    }
    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.quote.first() else {
        return Ok(Vec::new());
    };

    let mut candles: Vec<Candle> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &secs)| {
            let ts = DateTime::<Utc>::from_timestamp(secs, 0)?;
            let (open, high, low, close, volume) = quote.row(i)?;
            Some(Candle { ts, open, high, low, close, volume })
        })
        .collect();

    candles.sort_by_key(|c| c.ts);
    candles.dedup_by_key(|c| c.ts);
    Ok(candles)
}
