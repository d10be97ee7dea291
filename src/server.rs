use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::dispatch::{Dispatcher, PrintJobRequest};
use crate::errors::AppResult;
use crate::fetch::{DocumentFetcher, HttpFetcher};
use crate::printers::{self, PrinterBackend, PrinterHandle};
use crate::registry::PrinterRegistry;
use crate::response::DispatchResult;
use crate::selection::SelectionState;

/// Owns the printer registry, the selection and the dispatcher.
///
/// Handed to the HTTP layer through `web::Data`; nothing here is global, so
/// any number of servers can live side by side.
pub struct PrintServer {
    registry: Arc<PrinterRegistry>,
    selection: Arc<SelectionState>,
    dispatcher: Dispatcher,
}

impl PrintServer {
    pub fn new(
        backend: Arc<dyn PrinterBackend>,
        fetcher: Arc<dyn DocumentFetcher>,
        config: &Config,
    ) -> Self {
        let selection = Arc::new(SelectionState::new());
        let dispatcher = Dispatcher::new(
            selection.clone(),
            fetcher,
            config.dispatch.temp_dir.clone(),
        )
        .with_raw_limit(config.dispatch.max_raw_bytes());

        Self {
            registry: Arc::new(PrinterRegistry::new(backend)),
            selection,
            dispatcher,
        }
    }

    /// Builds the server with the backend and fetcher the configuration asks for.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let backend = printers::new_backend(&config.printer);
        let fetcher = HttpFetcher::new(config.dispatch.fetch_timeout())?;
        Ok(Self::new(backend, Arc::new(fetcher), config))
    }

    /// Runs `f` on the blocking pool; enumeration talks to the print system
    /// synchronously.
    async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&PrinterRegistry, &SelectionState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let registry = self.registry.clone();
        let selection = self.selection.clone();
        Ok(tokio::task::spawn_blocking(move || f(&*registry, &*selection)).await?)
    }

    pub async fn list_printers(&self) -> AppResult<Vec<String>> {
        self.blocking(|registry, _| registry.list()).await
    }

    pub async fn refresh_printers(&self) -> AppResult<Vec<String>> {
        self.blocking(|registry, _| {
            registry.refresh();
            registry.list()
        })
        .await
    }

    pub async fn lookup(&self, name: &str) -> AppResult<Option<PrinterHandle>> {
        let name = name.to_string();
        self.blocking(move |registry, _| registry.lookup(&name)).await
    }

    pub async fn select_printer(&self, raw_name: &str) -> AppResult<PrinterHandle> {
        let raw_name = raw_name.to_string();
        Ok(self
            .blocking(move |registry, selection| selection.select(registry, &raw_name))
            .await??)
    }

    pub fn selected_printer(&self) -> Option<PrinterHandle> {
        self.selection.current()
    }

    pub fn is_printer_selected(&self) -> bool {
        self.selection.is_selected()
    }

    pub fn backend_name(&self) -> &'static str {
        self.registry.backend_name()
    }

    pub async fn dispatch(&self, request: PrintJobRequest) -> DispatchResult {
        self.dispatcher.dispatch(request).await
    }

    /// Forgets the selection and the discovered printers.
    pub fn stop(&self) {
        info!("Print server stopped, clearing selection and printer cache");
        self.selection.clear();
        self.registry.clear();
    }

    /// Stops, then re-enumerates printers so the next request starts warm.
    pub async fn restart(&self) -> AppResult<usize> {
        self.stop();
        let count = self.blocking(|registry, _| registry.refresh()).await?;
        info!("Print server restarted with {} printer(s)", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printers::{MockPrinterBackend, PrintDocument};
    use bytes::Bytes;

    fn server(backend: &MockPrinterBackend) -> PrintServer {
        let fetcher = HttpFetcher::new(None).expect("fetcher");
        PrintServer::new(Arc::new(backend.clone()), Arc::new(fetcher), &Config::for_tests())
    }

    #[tokio::test]
    async fn test_label_printer_end_to_end() {
        let backend = MockPrinterBackend::new(["LabelPrinter"]);
        let server = server(&backend);

        let selected: DispatchResult = server.select_printer("LabelPrinter").await.into();
        assert_eq!(selected.to_legacy(), "OK");

        let printed = server
            .dispatch(PrintJobRequest::Raw(Bytes::from_static(b"^XA^FDHELLO^FS^XZ")))
            .await;
        assert_eq!(printed.to_legacy(), "OK");

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0].document,
            PrintDocument::Autosense(Bytes::from_static(b"^XA^FDHELLO^FS^XZ"))
        );
    }

    #[tokio::test]
    async fn test_stop_clears_state() {
        let backend = MockPrinterBackend::new(["LabelPrinter"]);
        let server = server(&backend);
        server.select_printer("LabelPrinter").await.expect("select");

        server.stop();
        assert!(!server.is_printer_selected());

        backend.set_devices(["Laser"]);
        assert_eq!(server.list_printers().await.expect("list"), vec!["Laser"]);
    }

    #[tokio::test]
    async fn test_restart_reenumerates() {
        let backend = MockPrinterBackend::new(["A", "B"]);
        let server = server(&backend);
        assert_eq!(server.list_printers().await.expect("list").len(), 2);

        backend.set_devices(["C"]);
        assert_eq!(server.restart().await.expect("restart"), 1);
        assert!(server.lookup("A").await.expect("lookup").is_none());
        assert!(server.lookup("C").await.expect("lookup").is_some());
    }

    #[tokio::test]
    async fn test_unknown_printer_keeps_selection_message() {
        let server = server(&MockPrinterBackend::new(["Zebra"]));
        let err = server.select_printer("Ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "Printer not found: Ghost");
        assert!(!server.is_printer_selected());
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let first = server(&MockPrinterBackend::new(["Shared"]));
        let second = server(&MockPrinterBackend::new(["Shared"]));

        first.select_printer("Shared").await.expect("select");
        assert!(first.is_printer_selected());
        assert!(!second.is_printer_selected());
    }
}
