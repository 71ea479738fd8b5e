use actix_web::HttpResponse;
use tollgate_shared::ApiResponse;

/// GET /api/hello
pub async fn hello() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok("hello").with_message("request admitted"))
}
