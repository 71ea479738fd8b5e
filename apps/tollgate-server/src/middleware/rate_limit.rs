//! Rate limiting middleware.

use actix_web::{
    Error, HttpRequest, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderMap, HeaderName, HeaderValue},
};
use chrono::{DateTime, Utc};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use tollgate_core::domain::RateLimitResult;
use tollgate_core::ports::RateLimiter;

use super::error::AppError;
use crate::state::AppState;

/// Header names for the quota annotations.
pub static LIMIT_HEADER: &str = "x-ratelimit-limit";
pub static REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub static RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    trust_date_header: bool,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            limiter,
            trust_date_header: false,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.limiter.clone()).trust_date_header(state.trust_date_header)
    }

    /// Take the request time from an RFC 3339 `Date` header when present.
    pub fn trust_date_header(mut self, trust: bool) -> Self {
        self.trust_date_header = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_date_header: self.trust_date_header,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    trust_date_header: bool,
}

/// Client identifier: first non-empty `X-Forwarded-For` entry, else the
/// peer address.
fn client_key(req: &HttpRequest) -> String {
    let forwarded = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| {
            chain
                .split(',')
                .map(str::trim)
                .find(|addr| !addr.is_empty())
                .map(str::to_string)
        });

    forwarded
        .or_else(|| req.connection_info().peer_addr().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Request time carried in the `Date` header, if it parses as RFC 3339.
fn request_time(req: &HttpRequest) -> Option<DateTime<Utc>> {
    let value = req.headers().get("Date")?.to_str().ok()?;
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// Whole seconds until the window resets, rounded up.
fn retry_after_secs(result: &RateLimitResult, now: DateTime<Utc>) -> u64 {
    let wait = result.reset_after(now);
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, limit: i64, result: &RateLimitResult) {
    headers.insert(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(limit));
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(result.remaining),
    );
    if let Ok(reset) = HeaderValue::from_str(&result.reset_at.to_rfc3339()) {
        headers.insert(HeaderName::from_static(RESET_HEADER), reset);
    }
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();

        let key = client_key(req.request());
        let carried_time = if self.trust_date_header {
            request_time(req.request())
        } else {
            None
        };

        Box::pin(async move {
            let checked = match carried_time {
                Some(now) => limiter.get_at(&key, now).await,
                None => limiter.get(&key).await,
            };

            let result = match checked {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Rate limiter error");
                    let response = AppError::from(e).error_response();
                    let (http_req, _payload) = req.into_parts();
                    return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
                }
            };

            let limit = limiter.quota().limit();

            if !result.is_allowed() {
                // Rate limited - return 429 immediately
                tracing::warn!(key = %key, reset = %result.reset_at, "Rate limit exceeded");

                let now = carried_time.unwrap_or_else(Utc::now);
                let retry_after = retry_after_secs(&result, now);
                let mut response = AppError::TooManyRequests { retry_after }.error_response();
                insert_rate_limit_headers(response.headers_mut(), limit, &result);

                let (http_req, _payload) = req.into_parts();
                return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
            }

            tracing::debug!(key = %key, remaining = result.remaining, "Request admitted");

            let mut res = service.call(req).await?;
            insert_rate_limit_headers(res.headers_mut(), limit, &result);
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;
    use actix_web::{App, HttpResponse, http::StatusCode, web};
    use async_trait::async_trait;
    use std::time::Duration;

    use tollgate_core::RateLimitError;
    use tollgate_core::domain::Quota;
    use tollgate_infra::Limiter;

    /// Limiter whose backend is always down.
    struct UnreachableLimiter;

    #[async_trait]
    impl RateLimiter for UnreachableLimiter {
        async fn get(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
            self.get_at(key, Utc::now()).await
        }

        async fn get_at(
            &self,
            _key: &str,
            _now: DateTime<Utc>,
        ) -> Result<RateLimitResult, RateLimitError> {
            Err(RateLimitError::Backend("connection refused".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), RateLimitError> {
            Err(RateLimitError::Backend("connection refused".into()))
        }

        fn quota(&self) -> Quota {
            Quota::default()
        }
    }

    fn local(limit: i64, window: Duration) -> Arc<dyn RateLimiter> {
        Arc::new(Limiter::local(limit, window))
    }

    fn header<B>(res: &ServiceResponse<B>, name: &str) -> String {
        res.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    fn forwarded(addr: &str) -> actix_test::TestRequest {
        actix_test::TestRequest::get()
            .uri("/")
            .insert_header(("X-Forwarded-For", addr))
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().body("ok")
    }

    #[actix_web::test]
    async fn test_admits_until_quota_exhausted() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(local(2, Duration::from_secs(60))))
                .route("/", web::get().to(ok)),
        )
        .await;

        for expected in ["1", "0"] {
            let res = actix_test::call_service(&app, forwarded("198.51.100.7").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(header(&res, LIMIT_HEADER), "2");
            assert_eq!(header(&res, REMAINING_HEADER), expected);
            assert!(!header(&res, RESET_HEADER).is_empty());
        }

        let res = actix_test::call_service(&app, forwarded("198.51.100.7").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&res, REMAINING_HEADER), "-1");
        assert!(!header(&res, "Retry-After").is_empty());

        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["status"], 429);
        assert_eq!(body["title"], "Too Many Requests");
    }

    #[actix_web::test]
    async fn test_clients_are_counted_separately() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(local(1, Duration::from_secs(60))))
                .route("/", web::get().to(ok)),
        )
        .await;

        let res = actix_test::call_service(&app, forwarded("203.0.113.1").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = actix_test::call_service(&app, forwarded("203.0.113.1").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        // First entry of the forwarded chain identifies the client
        let res =
            actix_test::call_service(&app, forwarded("203.0.113.2, 10.0.0.1").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, REMAINING_HEADER), "0");
    }

    #[actix_web::test]
    async fn test_peer_address_is_the_fallback_key() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(local(1, Duration::from_secs(60))))
                .route("/", web::get().to(ok)),
        )
        .await;

        let peer = "192.0.2.10:40000".parse().unwrap();
        let req = actix_test::TestRequest::get().uri("/").peer_addr(peer).to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = actix_test::TestRequest::get().uri("/").peer_addr(peer).to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        let res = actix_test::call_service(&app, forwarded("192.0.2.99").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_blank_forwarded_entries_are_skipped() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(local(1, Duration::from_secs(60))))
                .route("/", web::get().to(ok)),
        )
        .await;

        // Leading blank entry: the next entry is the client
        let res = actix_test::call_service(&app, forwarded(" , 203.0.113.5").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = actix_test::call_service(&app, forwarded("203.0.113.5").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        // Nothing usable in the chain: the peer address is the client
        let peer = "192.0.2.10:40000".parse().unwrap();
        let req = forwarded(" , ").peer_addr(peer).to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = actix_test::TestRequest::get().uri("/").peer_addr(peer).to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        // A different client behind an empty chain is not lumped with others
        let other = "192.0.2.11:40000".parse().unwrap();
        let req = forwarded("").peer_addr(other).to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_forwarded_for_wins_over_forwarded_header() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(local(1, Duration::from_secs(60))))
                .route("/", web::get().to(ok)),
        )
        .await;

        let req = forwarded("203.0.113.5")
            .insert_header(("Forwarded", "for=10.9.9.9"))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);

        let res = actix_test::call_service(&app, forwarded("203.0.113.5").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let req = forwarded("198.51.100.99")
            .insert_header(("Forwarded", "for=10.9.9.9"))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_trusted_date_header_drives_the_window() {
        let app = actix_test::init_service(
            App::new()
                .wrap(
                    RateLimitMiddleware::new(local(1, Duration::from_secs(1)))
                        .trust_date_header(true),
                )
                .route("/", web::get().to(ok)),
        )
        .await;

        let at = |date: &str| forwarded("198.51.100.20").insert_header(("Date", date));

        let res = actix_test::call_service(&app, at("2024-03-01T12:00:00Z").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, RESET_HEADER), "2024-03-01T12:00:01+00:00");

        let res = actix_test::call_service(&app, at("2024-03-01T12:00:00.500Z").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&res, "Retry-After"), "1");

        let res = actix_test::call_service(&app, at("2024-03-01T12:00:01Z").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, RESET_HEADER), "2024-03-01T12:00:02+00:00");
    }

    #[actix_web::test]
    async fn test_date_header_ignored_unless_trusted() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(local(5, Duration::from_secs(60))))
                .route("/", web::get().to(ok)),
        )
        .await;

        let req = forwarded("198.51.100.21")
            .insert_header(("Date", "2001-01-01T00:00:00Z"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!header(&res, RESET_HEADER).starts_with("2001"));
    }

    #[actix_web::test]
    async fn test_backend_failure_is_a_server_error() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(Arc::new(UnreachableLimiter)))
                .route("/", web::get().to(ok)),
        )
        .await;

        let res = actix_test::call_service(&app, forwarded("198.51.100.30").to_request()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(header(&res, REMAINING_HEADER).is_empty());

        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["status"], 500);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let result = RateLimitResult {
            remaining: -1,
            reset_at: now + chrono::Duration::milliseconds(2001),
        };
        assert_eq!(retry_after_secs(&result, now), 3);

        let result = RateLimitResult {
            remaining: -1,
            reset_at: now - chrono::Duration::seconds(1),
        };
        assert_eq!(retry_after_secs(&result, now), 0);
    }
}
