// Route modules organization

pub mod base_routes;
pub mod printer_routes;

// Re-export all routes for convenience
pub use base_routes::*;
pub use printer_routes::*;

use actix_web::web;

/// Registers every route; the CORS preflight catch-all goes last.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(hello)
        .service(get_printers)
        .service(refresh_printers)
        .service(get_printer)
        .service(set_printer)
        .service(print_raw)
        .service(print_file_by_url)
        .service(restart)
        .service(preflight);
}
