use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failures reported by a print backend.
#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Printer not found: {name}")]
    NotFound { name: String },

    #[error("Print job failed: {0}")]
    PrintFailed(String),
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Unable to decode printer name: {0}")]
    Decode(String),

    #[error("Printer not found: {name}")]
    NotFound { name: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unable to open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("Server returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read document: {0}")]
    Read(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Everything that can go wrong while dispatching one print job.
///
/// Each variant renders as a short English message; the dispatcher never lets
/// any of them escape as anything but a failed `DispatchResult`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No printer selected")]
    NoPrinterSelected,

    #[error("{0}")]
    MalformedSource(String),

    #[error("{0}")]
    TransferFailed(String),

    #[error("Unable to create temporary file: {0}")]
    TempFileFailed(String),

    #[error("Unable to load PDF document: {0}")]
    DocumentLoadFailed(String),

    #[error("Unable to find the printer: {0}")]
    PrintServiceBindingFailed(String),

    #[error("{0}")]
    SubmissionFailed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid fetch timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid raw document limit: {0}")]
    InvalidRawLimit(String),

    #[error("Invalid temp directory: {path}")]
    InvalidTempDir { path: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoPrinterSelected => "no_printer_selected",
            DispatchError::MalformedSource(_) => "malformed_source",
            DispatchError::TransferFailed(_) => "transfer_failed",
            DispatchError::TempFileFailed(_) => "temp_file_failed",
            DispatchError::DocumentLoadFailed(_) => "document_load_failed",
            DispatchError::PrintServiceBindingFailed(_) => "service_binding_failed",
            DispatchError::SubmissionFailed(_) => "submission_failed",
        }
    }
}

impl From<FetchError> for DispatchError {
    fn from(err: FetchError) -> Self {
        DispatchError::TransferFailed(err.to_string())
    }
}
