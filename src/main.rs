use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use metrics_exporter_prometheus::PrometheusBuilder;

use signal_scanner::{
    config::settings::Settings,
    middleware::metrics::Metrics,
    routes::{
        health::{health_scope, liveness},
        metrics::metrics_scope,
        scan::scan_scope,
    },
    services::{
        market_data::YahooChartProvider,
        reference_cache::ReferenceCache,
        scan_engine::{ScanConfig, ScanEngine},
    },
};


fn init_logging() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let settings = Settings::new().unwrap_or_else(|e| {
        eprintln!("Failed to load settings: {e}");
        std::process::exit(1);
    });
    log::info!(
        "starting signal scanner: {} assets, reference {}",
        settings.watchlist.len(),
        settings.reference_asset
    );

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .unwrap_or_else(|e| {
            eprintln!("Failed to install metrics recorder: {e}");
            std::process::exit(1);
        });

    let provider = YahooChartProvider::new(
        &settings.market_data_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
        .unwrap_or_else(|e| {
            eprintln!("Failed to build market data client: {e}");
            std::process::exit(1);
        });

    let engine = web::Data::new(ScanEngine::new(
        Arc::new(provider),
        ReferenceCache::new(settings.reference_asset.clone(), settings.daily_period.clone()),
        ScanConfig::from_settings(&settings),
    ));
    let prometheus = web::Data::new(prometheus);
    let port = settings.server_port;

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Metrics)
            .app_data(engine.clone())
            .app_data(prometheus.clone())

            .service(liveness)
            .service(health_scope())
            .service(scan_scope())
            .service(metrics_scope())
    })
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
