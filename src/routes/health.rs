use actix_web::{get, web, HttpResponse, Scope};

#[get("/")]
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Signal scanner is running")
}

#[get("")]
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub fn health_scope() -> Scope {
    web::scope("/health")
        .service(health_check)
}
