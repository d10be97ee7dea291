// Library module organization

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fetch;
pub mod printers;
pub mod registry;
pub mod response;
pub mod routes;
pub mod selection;
pub mod server;

// Re-export commonly used types for convenience
pub use dispatch::{Dispatcher, PrintJobRequest};
pub use errors::{AppError, DispatchError, FetchError, PrinterError, SelectionError};
pub use fetch::{DocumentFetcher, HttpFetcher, RemoteDocument};
pub use self::printers::{
    new_backend, MockPrinterBackend, PrintDocument, PrintJob, PrintService, PrinterBackend,
    PrinterHandle, SubmittedJob,
};
pub use registry::PrinterRegistry;
pub use response::{DispatchResult, ResponseBody};
pub use selection::SelectionState;
pub use server::PrintServer;

#[cfg(feature = "printer-cups")]
pub use self::printers::CupsBackend;
