use actix_web::{get, middleware, options, post, web, HttpRequest, HttpResponse, Responder};
use tracing::info;

use crate::config::CorsConfig;
use crate::response::ResponseBody;
use crate::server::PrintServer;

const ACCESS_CONTROL_REQUEST_HEADERS: &str = "Access-Control-Request-Headers";
const ACCESS_CONTROL_REQUEST_METHOD: &str = "Access-Control-Request-Method";

#[get("/")]
pub async fn hello() -> impl Responder {
    HttpResponse::Ok().json(ResponseBody::ok("Hello World !"))
}

/// Drops the selection and re-enumerates printers.
#[post("/restart")]
pub async fn restart(server: web::Data<PrintServer>) -> impl Responder {
    let body = match server.restart().await {
        Ok(count) => ResponseBody::ok(format!("{} printer(s) found", count)),
        Err(e) => ResponseBody::error(e.to_string()),
    };
    HttpResponse::Ok().json(body)
}

/// CORS preflight: echoes whatever the browser asks to send.
#[options("/{tail:.*}")]
pub async fn preflight(req: HttpRequest) -> impl Responder {
    let mut response = HttpResponse::Ok();

    if let Some(headers) = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
        response.insert_header(("Access-Control-Allow-Headers", headers.clone()));
    }
    if let Some(method) = req.headers().get(ACCESS_CONTROL_REQUEST_METHOD) {
        response.insert_header(("Access-Control-Allow-Methods", method.clone()));
    }

    response.json(ResponseBody::ok("OK"))
}

/// Headers stamped on every response.
pub fn cors_headers(cors: &CorsConfig) -> middleware::DefaultHeaders {
    info!(
        "CORS: origin '{}', methods '{}', headers '{}'",
        cors.allow_origin, cors.allow_methods, cors.allow_headers
    );

    middleware::DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", cors.allow_origin.clone()))
        .add((ACCESS_CONTROL_REQUEST_METHOD, cors.allow_methods.clone()))
        .add(("Access-Control-Allow-Headers", cors.allow_headers.clone()))
}
