use std::future::{ready, Ready};
use std::time::Instant;

use actix_web::{
    dev::{self, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;

/// Per-request line for slow endpoints: method, path and query on the way
/// in, status and elapsed time on the way out. Server errors log at `warn`,
/// everything else at `debug`.
pub struct PathLogger;

impl<S, B> Transform<S, ServiceRequest> for PathLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = PathLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PathLoggerMiddleware { service }))
    }
}

pub struct PathLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for PathLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let line = request_line(req.method().as_str(), req.path(), req.query_string());
        log::debug!("--> {line}");
        let started = Instant::now();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let elapsed_ms = started.elapsed().as_millis();
            if res.status().is_server_error() {
                log::warn!("<-- {line} {} in {elapsed_ms} ms", res.status());
            } else {
                log::debug!("<-- {line} {} in {elapsed_ms} ms", res.status());
            }
            Ok(res)
        })
    }
}

fn request_line(method: &str, path: &str, query: &str) -> String {
    if query.is_empty() {
        format!("{method} {path}")
    } else {
        format!("{method} {path}?{query}")
    }
}
