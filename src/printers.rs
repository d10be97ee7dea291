use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
#[cfg(feature = "printer-cups")]
use ::printers::{
    common::base::job::PrinterJobOptions, common::base::printer::Printer as PrintersCratePrinter,
    get_printer_by_name, get_printers,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PrinterConfig;
use crate::errors::PrinterError;

/// Payload handed to a print job.
#[derive(Debug, Clone, PartialEq)]
pub enum PrintDocument {
    /// Raw bytes; the spooler detects the format (ZPL, ESC/POS, PostScript...).
    Autosense(Bytes),
    /// A PDF already written to disk and checked by the document loader.
    Pdf {
        path: PathBuf,
        job_name: Option<String>,
        page_count: usize,
    },
}

impl PrintDocument {
    /// Short description used when logging a submission.
    pub fn describe(&self) -> String {
        match self {
            PrintDocument::Autosense(bytes) => format!("{} raw byte(s)", bytes.len()),
            PrintDocument::Pdf {
                job_name,
                page_count,
                ..
            } => format!(
                "{} page PDF '{}'",
                page_count,
                job_name.as_deref().unwrap_or("untitled")
            ),
        }
    }
}

/// A job bound to one print service, consumed by its single submission.
#[async_trait]
pub trait PrintJob: Send {
    /// Returns the spooler's job id.
    async fn submit(self: Box<Self>, document: PrintDocument) -> Result<String, PrinterError>;
}

/// OS-specific capability object behind a `PrinterHandle`.
pub trait PrintService: Send + Sync {
    fn name(&self) -> &str;
    fn create_job(&self) -> Result<Box<dyn PrintJob>, PrinterError>;
}

/// Source of print devices visible to the host.
pub trait PrinterBackend: Send + Sync {
    fn enumerate(&self) -> Vec<PrinterHandle>;
    fn type_name(&self) -> &'static str;
}

/// Cheap, immutable reference to a discovered print device.
#[derive(Clone)]
pub struct PrinterHandle {
    name: String,
    service: Arc<dyn PrintService>,
}

impl PrinterHandle {
    pub fn new(service: Arc<dyn PrintService>) -> Self {
        Self {
            name: service.name().to_string(),
            service,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_job(&self) -> Result<Box<dyn PrintJob>, PrinterError> {
        self.service.create_job()
    }
}

impl fmt::Debug for PrinterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrinterHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PrinterHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.service, &other.service)
    }
}

// ============================================================================
// CUPS backend
// ============================================================================

#[cfg(feature = "printer-cups")]
pub struct CupsBackend;

#[cfg(feature = "printer-cups")]
impl PrinterBackend for CupsBackend {
    fn enumerate(&self) -> Vec<PrinterHandle> {
        let printers = get_printers();
        info!("CUPS reported {} printer(s)", printers.len());

        printers
            .into_iter()
            .map(|printer| {
                debug!(
                    "  - Name: '{}', System Name: '{}', URI: '{}'",
                    printer.name, printer.system_name, printer.uri
                );
                PrinterHandle::new(Arc::new(CupsPrintService { printer }))
            })
            .collect()
    }

    fn type_name(&self) -> &'static str {
        "CUPS"
    }
}

#[cfg(feature = "printer-cups")]
struct CupsPrintService {
    printer: PrintersCratePrinter,
}

#[cfg(feature = "printer-cups")]
impl PrintService for CupsPrintService {
    fn name(&self) -> &str {
        &self.printer.name
    }

    fn create_job(&self) -> Result<Box<dyn PrintJob>, PrinterError> {
        // Re-resolve so a queue removed since enumeration is reported here
        // instead of at submission.
        let printer = get_printer_by_name(&self.printer.system_name).ok_or_else(|| {
            warn!("'{}' is no longer known to CUPS", self.printer.system_name);
            PrinterError::NotFound {
                name: self.printer.name.clone(),
            }
        })?;

        Ok(Box::new(CupsPrintJob { printer }))
    }
}

#[cfg(feature = "printer-cups")]
struct CupsPrintJob {
    printer: PrintersCratePrinter,
}

#[cfg(feature = "printer-cups")]
#[async_trait]
impl PrintJob for CupsPrintJob {
    async fn submit(self: Box<Self>, document: PrintDocument) -> Result<String, PrinterError> {
        let printer = self.printer;
        info!("Submitting {} to '{}'", document.describe(), printer.name);

        // The printers crate talks to libcups synchronously.
        let result = tokio::task::spawn_blocking(move || match document {
            PrintDocument::Autosense(bytes) => {
                let options = PrinterJobOptions {
                    name: None,
                    raw_properties: &[],
                };
                printer
                    .print(&bytes, options)
                    .map(|job_id| job_id.to_string())
                    .map_err(|e| PrinterError::PrintFailed(format!("CUPS print error: {}", e)))
            }
            PrintDocument::Pdf {
                path, job_name, ..
            } => {
                let path = path.to_str().ok_or_else(|| {
                    PrinterError::PrintFailed(format!("Non UTF-8 spool path: {:?}", path))
                })?;
                let options = PrinterJobOptions {
                    name: job_name.as_deref(),
                    raw_properties: &[],
                };
                printer
                    .print_file(path, options)
                    .map(|job_id| job_id.to_string())
                    .map_err(|e| PrinterError::PrintFailed(format!("CUPS print error: {}", e)))
            }
        })
        .await
        .map_err(|e| PrinterError::PrintFailed(format!("Print task aborted: {}", e)))?;

        // Accepted by CUPS only; the device may still fail to print it.
        match &result {
            Ok(job_id) => info!("Print job submitted successfully with ID: {}", job_id),
            Err(e) => warn!("Print job failed: {}", e),
        }
        result
    }
}

// ============================================================================
// Mock backend
// ============================================================================

/// One submission recorded by `MockPrinterBackend`.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job_id: String,
    pub printer: String,
    pub document: PrintDocument,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Default)]
struct MockState {
    devices: Vec<String>,
    submissions: Vec<SubmittedJob>,
    fail_submissions: bool,
}

/// In-memory backend for tests and hosts without a print system.
///
/// Devices can be replaced at runtime to simulate hardware being plugged in or
/// removed; handles to removed devices fail at job creation.
#[derive(Clone, Default)]
pub struct MockPrinterBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockPrinterBackend {
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        backend.set_devices(devices);
        backend
    }

    pub fn set_devices<I, S>(&self, devices: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().devices = devices.into_iter().map(Into::into).collect();
    }

    /// Make every subsequent submission fail.
    pub fn fail_submissions(&self, fail: bool) {
        self.lock().fail_submissions = fail;
    }

    pub fn submissions(&self) -> Vec<SubmittedJob> {
        self.lock().submissions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PrinterBackend for MockPrinterBackend {
    fn enumerate(&self) -> Vec<PrinterHandle> {
        self.lock()
            .devices
            .iter()
            .map(|name| {
                PrinterHandle::new(Arc::new(MockPrintService {
                    name: name.clone(),
                    state: self.state.clone(),
                }))
            })
            .collect()
    }

    fn type_name(&self) -> &'static str {
        "Mock Printer"
    }
}

struct MockPrintService {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl PrintService for MockPrintService {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_job(&self) -> Result<Box<dyn PrintJob>, PrinterError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.devices.contains(&self.name) {
            return Err(PrinterError::NotFound {
                name: self.name.clone(),
            });
        }

        Ok(Box::new(MockPrintJob {
            printer: self.name.clone(),
            state: self.state.clone(),
        }))
    }
}

struct MockPrintJob {
    printer: String,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl PrintJob for MockPrintJob {
    async fn submit(self: Box<Self>, document: PrintDocument) -> Result<String, PrinterError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.fail_submissions {
            return Err(PrinterError::PrintFailed(format!(
                "{} rejected the job",
                self.printer
            )));
        }

        let job_id = format!("mock-job-{}", Uuid::new_v4());
        debug!("{} accepted {} as {}", self.printer, document.describe(), job_id);
        state.submissions.push(SubmittedJob {
            job_id: job_id.clone(),
            printer: self.printer.clone(),
            document,
            submitted_at: Utc::now(),
        });
        Ok(job_id)
    }
}

// Factory function to create the backend named by the configuration
pub fn new_backend(config: &PrinterConfig) -> Arc<dyn PrinterBackend> {
    if config.use_mock {
        info!(
            "Using mock printer backend with devices: {:?}",
            config.mock_devices
        );
        return Arc::new(MockPrinterBackend::new(config.mock_devices.clone()));
    }

    system_backend(config)
}

#[cfg(feature = "printer-cups")]
fn system_backend(_config: &PrinterConfig) -> Arc<dyn PrinterBackend> {
    info!("Using CUPS printer backend");
    Arc::new(CupsBackend)
}

#[cfg(not(feature = "printer-cups"))]
fn system_backend(config: &PrinterConfig) -> Arc<dyn PrinterBackend> {
    // When CUPS feature is not enabled, always use mock printer
    warn!("Built without CUPS support, falling back to mock printer backend");
    Arc::new(MockPrinterBackend::new(config.mock_devices.clone()))
}
