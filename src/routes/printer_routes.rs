use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use tracing::{info, warn};

use crate::dispatch::PrintJobRequest;
use crate::errors::AppResult;
use crate::response::{DispatchResult, ResponseBody};
use crate::server::PrintServer;

const NO_PRINTER_FOUND: &str = "No printer found...";
const NOT_SELECTED: &str = "N/A";

fn printer_list_body(names: AppResult<Vec<String>>) -> ResponseBody {
    let names = match names {
        Ok(names) => names,
        Err(e) => {
            warn!("Printer enumeration failed: {}", e);
            return ResponseBody::error(e.to_string());
        }
    };

    if names.is_empty() {
        warn!("No printer found");
        return ResponseBody::error(NO_PRINTER_FOUND);
    }

    for name in &names {
        info!("    > {}", name);
    }
    ResponseBody::ok(names.join("|"))
}

#[get("/getPrinters")]
pub async fn get_printers(server: web::Data<PrintServer>) -> impl Responder {
    info!("getPrinters");
    HttpResponse::Ok().json(printer_list_body(server.list_printers().await))
}

#[post("/refreshPrinters")]
pub async fn refresh_printers(server: web::Data<PrintServer>) -> impl Responder {
    info!("refreshPrinters");
    HttpResponse::Ok().json(printer_list_body(server.refresh_printers().await))
}

#[get("/getPrinter")]
pub async fn get_printer(server: web::Data<PrintServer>) -> impl Responder {
    let name = server
        .selected_printer()
        .map(|printer| printer.name().to_string())
        .unwrap_or_else(|| NOT_SELECTED.to_string());

    info!("getPrinter > {}", name);
    HttpResponse::Ok().json(ResponseBody::ok(name))
}

#[get("/setPrinter/{name}")]
pub async fn set_printer(req: HttpRequest, server: web::Data<PrintServer>) -> impl Responder {
    // Raw segment: the selection decodes it and reports bad escapes itself.
    let name = req.match_info().get("name").unwrap_or_default();
    info!("setPrinter > {}", name);

    let result: DispatchResult = server.select_printer(name).await.into();
    HttpResponse::Ok().json(ResponseBody::from(result))
}

#[post("/printRaw")]
pub async fn print_raw(server: web::Data<PrintServer>, body: Bytes) -> impl Responder {
    let result = server.dispatch(PrintJobRequest::Raw(body)).await;
    HttpResponse::Ok().json(ResponseBody::from(result))
}

#[post("/printFileByURL")]
pub async fn print_file_by_url(server: web::Data<PrintServer>, body: Bytes) -> impl Responder {
    let url = match String::from_utf8(body.to_vec()) {
        Ok(url) => url,
        Err(e) => {
            warn!("printFileByURL body is not UTF-8: {}", e);
            return HttpResponse::Ok().json(ResponseBody::error(format!(
                "Request body is not a valid URL: {}",
                e
            )));
        }
    };

    let result = server.dispatch(PrintJobRequest::RemoteDocument(url)).await;
    HttpResponse::Ok().json(ResponseBody::from(result))
}
