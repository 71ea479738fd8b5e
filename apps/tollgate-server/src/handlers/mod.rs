//! HTTP handlers and route configuration.

mod health;
mod hello;

use actix_web::{HttpRequest, web};

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::state::AppState;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Rate limited routes
            .service(
                web::scope("/hello")
                    .wrap(RateLimitMiddleware::from_state(state))
                    .route("", web::get().to(hello::hello)),
            ),
    )
    .default_service(web::to(not_found));
}

async fn not_found(req: HttpRequest) -> AppResult<&'static str> {
    Err(AppError::NotFound(format!("no route for {}", req.path())))
}
