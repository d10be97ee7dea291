use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Url;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::DispatchError;
use crate::fetch::{DocumentFetcher, RemoteDocument};
use crate::printers::{PrintDocument, PrintJob, PrinterHandle};
use crate::response::DispatchResult;
use crate::selection::SelectionState;

const SPOOL_PREFIX: &str = "print-bridge-";
const SPOOL_SUFFIX: &str = ".pdf";

/// One print job as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum PrintJobRequest {
    /// Device-control bytes (ZPL, DPL, ESC/POS...) sent as-is.
    Raw(Bytes),
    /// URL of a document to download and print.
    RemoteDocument(String),
}

/// Sends print jobs to the currently selected printer.
pub struct Dispatcher {
    selection: Arc<SelectionState>,
    fetcher: Arc<dyn DocumentFetcher>,
    temp_dir: Option<PathBuf>,
    max_raw_bytes: Option<usize>,
}

impl Dispatcher {
    pub fn new(
        selection: Arc<SelectionState>,
        fetcher: Arc<dyn DocumentFetcher>,
        temp_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            selection,
            fetcher,
            temp_dir,
            max_raw_bytes: None,
        }
    }

    /// Caps how much of a non-PDF download is buffered before printing.
    pub fn with_raw_limit(mut self, max_raw_bytes: Option<usize>) -> Self {
        self.max_raw_bytes = max_raw_bytes;
        self
    }

    pub async fn dispatch(&self, request: PrintJobRequest) -> DispatchResult {
        let result = match request {
            PrintJobRequest::Raw(bytes) => self.print_raw(bytes).await,
            PrintJobRequest::RemoteDocument(url) => self.print_url(&url).await,
        };

        match &result {
            Ok(job_id) => info!("Dispatch succeeded, job ID: {}", job_id),
            Err(e) => warn!("Dispatch failed ({}): {}", e.kind(), e),
        }
        DispatchResult::from(result)
    }

    /// Sends `bytes` straight to the selected printer.
    ///
    /// Selection is only checked when the job is created.
    pub async fn print_raw(&self, bytes: Bytes) -> Result<String, DispatchError> {
        info!("printRaw ({} bytes)", bytes.len());
        debug!("\n{}\n", String::from_utf8_lossy(&bytes));

        self.submit_autosense(bytes).await
    }

    /// Downloads the document at `source` and prints it.
    ///
    /// PDFs are spooled to disk and checked by the PDF loader first; every other
    /// content type is handed to the printer as a raw stream.
    pub async fn print_url(&self, source: &str) -> Result<String, DispatchError> {
        let source = source.trim();
        info!("printFileByURL > {}", source);

        if !self.selection.is_selected() {
            warn!("Operation aborted: No printer selected.");
            return Err(DispatchError::NoPrinterSelected);
        }

        let url = Url::parse(source).map_err(|e| {
            DispatchError::MalformedSource(format!("Malformed URL '{}': {}", source, e))
        })?;
        let document = self.fetcher.open(&url).await?;

        if document.is_pdf() {
            info!("    > application/pdf [{}]", source);
            self.print_pdf(source, document).await
        } else {
            info!(
                "    > {} [{}], sending as raw stream",
                document.content_type.as_deref().unwrap_or("no content type"),
                source
            );
            self.print_remote_raw(document).await
        }
    }

    async fn print_pdf(
        &self,
        source: &str,
        mut document: RemoteDocument,
    ) -> Result<String, DispatchError> {
        // Removed from disk when dropped, whichever way this returns.
        let mut spool = self.create_spool_file()?;
        debug!("Spooling PDF to {:?}", spool.path());

        let mut written = 0usize;
        while let Some(chunk) = document.body.next().await {
            let chunk = chunk?;
            spool
                .write_all(&chunk)
                .and_then(|_| spool.flush())
                .map_err(|e| DispatchError::TransferFailed(e.to_string()))?;
            written += chunk.len();
        }
        drop(document);
        debug!("Spooled {} bytes", written);

        let path = spool.path().to_path_buf();
        let page_count = load_pdf(path.clone()).await?;
        info!("Loaded PDF with {} page(s)", page_count);

        // The selection may have changed while downloading.
        let job = bind_job(self.selected_printer()?).await?;

        let document = PrintDocument::Pdf {
            path,
            job_name: job_name_from(source),
            page_count,
        };
        let job_id = job
            .submit(document)
            .await
            .map_err(|e| DispatchError::SubmissionFailed(e.to_string()))?;

        drop(spool);
        Ok(job_id)
    }

    async fn print_remote_raw(
        &self,
        mut document: RemoteDocument,
    ) -> Result<String, DispatchError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = document.body.next().await {
            let chunk = chunk?;
            if let Some(limit) = self.max_raw_bytes {
                if buffer.len() + chunk.len() > limit {
                    return Err(DispatchError::TransferFailed(format!(
                        "Document exceeds the {} byte limit for raw printing",
                        limit
                    )));
                }
            }
            buffer.extend_from_slice(&chunk);
        }
        drop(document);

        self.submit_autosense(buffer.freeze()).await
    }

    async fn submit_autosense(&self, bytes: Bytes) -> Result<String, DispatchError> {
        let job = bind_job(self.selected_printer()?).await?;

        job.submit(PrintDocument::Autosense(bytes))
            .await
            .map_err(|e| DispatchError::SubmissionFailed(e.to_string()))
    }

    fn selected_printer(&self) -> Result<PrinterHandle, DispatchError> {
        self.selection.current().ok_or_else(|| {
            warn!("Operation aborted: No printer selected.");
            DispatchError::NoPrinterSelected
        })
    }

    fn create_spool_file(&self) -> Result<NamedTempFile, DispatchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SPOOL_PREFIX).suffix(SPOOL_SUFFIX);

        let spool = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        spool.map_err(|e| DispatchError::TempFileFailed(e.to_string()))
    }
}

/// Creates a job on the printer's service; backends may block while resolving
/// the device.
async fn bind_job(printer: PrinterHandle) -> Result<Box<dyn PrintJob>, DispatchError> {
    tokio::task::spawn_blocking(move || printer.create_job())
        .await
        .map_err(|e| DispatchError::PrintServiceBindingFailed(e.to_string()))?
        .map_err(|e| DispatchError::PrintServiceBindingFailed(e.to_string()))
}

/// Loads the spooled PDF and returns its page count.
async fn load_pdf(path: PathBuf) -> Result<usize, DispatchError> {
    tokio::task::spawn_blocking(move || count_pages(&path))
        .await
        .map_err(|e| DispatchError::DocumentLoadFailed(e.to_string()))?
}

fn count_pages(path: &Path) -> Result<usize, DispatchError> {
    let document = lopdf::Document::load(path)
        .map_err(|e| DispatchError::DocumentLoadFailed(e.to_string()))?;

    match document.get_pages().len() {
        0 => Err(DispatchError::DocumentLoadFailed(
            "document has no pages".to_string(),
        )),
        pages => Ok(pages),
    }
}

/// Text after the last `/` of the source URL.
fn job_name_from(source: &str) -> Option<String> {
    source
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
