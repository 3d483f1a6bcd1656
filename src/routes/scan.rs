// src/routes/scan.rs

use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, HttpResponse, Responder};

use crate::middleware::path_logger::PathLogger;
use crate::services::scan_engine::{ScanEngine, ScanResponse};

/// GET /scan – one pass over the watchlist, bucketed by status.
#[get("")]
pub async fn run_scan(engine: web::Data<ScanEngine>) -> impl Responder {
    let report = engine.run_scan().await;
    HttpResponse::Ok().json(ScanResponse::from(report))
}

pub fn scan_scope() -> impl HttpServiceFactory {
    web::scope("/scan")
        .wrap(PathLogger)
        .service(run_scan)
}
