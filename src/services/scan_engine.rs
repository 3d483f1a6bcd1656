//! Scan orchestrator: walks the watchlist, runs the daily pipeline per asset,
//! confirms strong setups on the hourly timeframe and buckets the results.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use metrics::{histogram, increment_counter};
use serde::Serialize;

use crate::config::settings::Settings;
use crate::services::market_data::{MarketDataProvider, Resolution};
use crate::services::reference_cache::ReferenceCache;
use crate::services::strategies::classifier::{self, ScanResult, SignalStatus, Tier};
use crate::services::strategies::setups::{scan_setups, AssetContext, Regime, MIN_HISTORY};
use crate::services::trigger;
use crate::utils::errors::{ProviderError, SkipReason};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub watchlist: Vec<String>,
    pub daily_period: String,
    pub hourly_period: String,
    /// Assets analysed at once; 1 keeps the pass strictly sequential.
    pub concurrency: usize,
}

impl ScanConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            watchlist: settings.watchlist.clone(),
            daily_period: settings.daily_period.clone(),
            hourly_period: settings.hourly_period.clone(),
            concurrency: settings.scan_concurrency,
        }
    }
}

/// What happened to one asset in one scan.
#[derive(Debug)]
pub enum AssetOutcome {
    Signal(ScanResult),
    NoSignal,
    Skipped(SkipReason),
}

impl AssetOutcome {
    fn tag(&self) -> &'static str {
        match self {
            AssetOutcome::Signal(r) => match r.status {
                SignalStatus::Confirmed => "confirmed",
                SignalStatus::AwaitingTrigger => "awaiting_trigger",
                SignalStatus::UnderObservation => "under_observation",
            },
            AssetOutcome::NoSignal => "no_signal",
            AssetOutcome::Skipped(_) => "skipped",
        }
    }
}

#[derive(Debug)]
pub struct SkippedAsset {
    pub asset: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub confirmed: Vec<ScanResult>,
    pub awaiting_trigger: Vec<ScanResult>,
    pub under_observation: Vec<ScanResult>,
    pub skipped: Vec<SkippedAsset>,
}

impl ScanReport {
    fn push(&mut self, asset: String, outcome: AssetOutcome) {
        match outcome {
            AssetOutcome::Signal(r) => match r.status {
                SignalStatus::Confirmed => self.confirmed.push(r),
                SignalStatus::AwaitingTrigger => self.awaiting_trigger.push(r),
                SignalStatus::UnderObservation => self.under_observation.push(r),
            },
            AssetOutcome::NoSignal => {}
            AssetOutcome::Skipped(reason) => self.skipped.push(SkippedAsset { asset, reason }),
        }
    }
}

/// JSON body of `GET /scan`.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    #[serde(rename = "sinaisConfirmados")]
    pub confirmed: Vec<ScanResult>,
    #[serde(rename = "setupsEmAndamento")]
    pub awaiting_trigger: Vec<ScanResult>,
    #[serde(rename = "ativosEmObservacao")]
    pub under_observation: Vec<ScanResult>,
}

impl From<ScanReport> for ScanResponse {
    fn from(r: ScanReport) -> Self {
        Self {
            confirmed: r.confirmed,
            awaiting_trigger: r.awaiting_trigger,
            under_observation: r.under_observation,
        }
    }
}

pub struct ScanEngine {
    provider: Arc<dyn MarketDataProvider>,
    cache: ReferenceCache,
    cfg: ScanConfig,
}

impl ScanEngine {
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: ReferenceCache, cfg: ScanConfig) -> Self {
        Self { provider, cache, cfg }
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    pub fn config(&self) -> &ScanConfig {
        &self.cfg
    }

    /// One pass over the watchlist. Buckets keep watchlist order.
    pub async fn run_scan(&self) -> ScanReport {
        let started = Instant::now();
        log::info!("scan started: {} assets", self.cfg.watchlist.len());

        let outcomes: Vec<(String, AssetOutcome)> = stream::iter(self.cfg.watchlist.iter().cloned())
            .map(|asset| async move {
                let outcome = self.analyze_asset(&asset).await;
                (asset, outcome)
            })
            .buffered(self.cfg.concurrency.max(1))
            .collect()
            .await;

        let mut report = ScanReport::default();
        for (asset, outcome) in outcomes {
            increment_counter!("scan_assets_total", "outcome" => outcome.tag());
            if let AssetOutcome::Skipped(reason) = &outcome {
                log::warn!("{asset}: skipped ({reason})");
                increment_counter!("scan_skips_total", "reason" => reason.tag());
            }
            report.push(asset, outcome);
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        histogram!("scan_duration_ms", elapsed_ms);
        log::info!(
            "scan finished in {:.0} ms: {} confirmed, {} awaiting trigger, {} under observation, {} skipped",
            elapsed_ms,
            report.confirmed.len(),
            report.awaiting_trigger.len(),
            report.under_observation.len(),
            report.skipped.len(),
        );
        report
    }

    pub async fn analyze_asset(&self, asset: &str) -> AssetOutcome {
        match self.try_analyze(asset).await {
            Ok(Some(result)) => AssetOutcome::Signal(result),
            Ok(None) => AssetOutcome::NoSignal,
            Err(reason) => AssetOutcome::Skipped(reason),
        }
    }

    async fn try_analyze(&self, asset: &str) -> Result<Option<ScanResult>, SkipReason> {
        let daily = match self
            .provider
            .fetch_candles(asset, &self.cfg.daily_period, Resolution::Daily)
            .await
        {
            Ok(c) if c.is_empty() => return Err(SkipReason::EmptyHistory),
            Ok(c) => c,
            Err(ProviderError::Empty(_)) => return Err(SkipReason::EmptyHistory),
            Err(e) => return Err(e.into()),
        };
        if daily.len() < MIN_HISTORY {
            return Err(SkipReason::InsufficientHistory { have: daily.len(), need: MIN_HISTORY });
        }

        let market_ok = if self.cache.is_reference(asset) {
            self.cache.prime(&daily).await;
            true
        } else {
            let reference = self
                .cache
                .get_or_populate(self.provider.as_ref())
                .await
                .map_err(|e| {
                    log::warn!("{asset}: reference {} unavailable: {e}", self.cache.asset());
                    SkipReason::ReferenceUnavailable
                })?;
            let last_date = daily[daily.len() - 1].date();
            reference.is_bullish_on(last_date).unwrap_or(false)
        };

        let ctx = AssetContext::build(&daily);
        let regime = Regime::assess(&ctx, market_ok);
        let scan = scan_setups(&ctx, &regime)?;
        log::debug!(
            "{asset}: regime {:?}, buy {} sell {}, rules {:?}",
            regime,
            scan.buy_score,
            scan.sell_score,
            scan.candidates.iter().map(|c| c.kind).collect::<Vec<_>>(),
        );

        let result = match classifier::tier(scan.total_score()) {
            Tier::NoSignal => None,
            Tier::UnderObservation => classifier::observe(asset, &scan),
            Tier::Confirmable => {
                let Some(principal) = scan.principal() else {
                    return Ok(None);
                };
                let hit = trigger::confirm(
                    self.provider.as_ref(),
                    asset,
                    &self.cfg.hourly_period,
                    scan.setup_date,
                    principal.direction,
                )
                .await;
                classifier::resolve(asset, &scan, hit)
            }
        };
        Ok(result)
    }
}
