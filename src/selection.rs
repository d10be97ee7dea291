use percent_encoding::percent_decode_str;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

use crate::errors::SelectionError;
use crate::printers::PrinterHandle;
use crate::registry::PrinterRegistry;

/// The single printer every dispatch goes to.
#[derive(Debug, Default)]
pub struct SelectionState {
    current: RwLock<Option<PrinterHandle>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the printer whose percent-encoded name is `raw_name`.
    ///
    /// Any failure clears the previous selection. The lookup may enumerate the
    /// backend, so it runs before the lock is taken.
    pub fn select(
        &self,
        registry: &PrinterRegistry,
        raw_name: &str,
    ) -> Result<PrinterHandle, SelectionError> {
        let found = decode_name(raw_name).and_then(|name| {
            registry
                .lookup(&name)
                .ok_or(SelectionError::NotFound { name })
        });

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match found {
            Ok(handle) => {
                info!("Selected printer: {}", handle.name());
                *current = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                warn!("Printer selection failed: {}", e);
                *current = None;
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<PrinterHandle> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_selected(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn clear(&self) {
        if let Some(previous) = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            info!("Cleared printer selection ({})", previous.name());
        }
    }
}

/// Strict percent-decoding: every `%` must start a two-digit hex escape and
/// the decoded bytes must be UTF-8.
pub fn decode_name(raw: &str) -> Result<String, SelectionError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(SelectionError::Decode(format!(
                    "incomplete escape sequence at position {} in '{}'",
                    i, raw
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(raw)
        .decode_utf8()
        .map(|name| name.into_owned())
        .map_err(|e| SelectionError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printers::{MockPrinterBackend, PrinterBackend};
    use std::sync::mpsc::{self, Receiver, SyncSender};
    use std::sync::{Arc, Mutex};

    /// Backend whose enumeration parks until the test releases it.
    struct GatedBackend {
        inner: MockPrinterBackend,
        entered: SyncSender<()>,
        release: Mutex<Receiver<()>>,
    }

    struct Gate {
        entered: Receiver<()>,
        release: SyncSender<()>,
    }

    fn gated(names: &[&str]) -> (GatedBackend, Gate) {
        let (entered_tx, entered_rx) = mpsc::sync_channel(1);
        let (release_tx, release_rx) = mpsc::sync_channel(1);
        let backend = GatedBackend {
            inner: MockPrinterBackend::new(names.iter().copied()),
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        let gate = Gate {
            entered: entered_rx,
            release: release_tx,
        };
        (backend, gate)
    }

    impl PrinterBackend for GatedBackend {
        fn enumerate(&self) -> Vec<PrinterHandle> {
            let _ = self.entered.send(());
            let _ = self
                .release
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .recv();
            self.inner.enumerate()
        }

        fn type_name(&self) -> &'static str {
            "Gated"
        }
    }

    fn registry(names: &[&str]) -> PrinterRegistry {
        PrinterRegistry::new(Arc::new(MockPrinterBackend::new(names.iter().copied())))
    }

    #[test]
    fn test_select_every_registered_printer() {
        let registry = registry(&["Zebra", "Laser", "Office Jet"]);
        let selection = SelectionState::new();

        for name in registry.list() {
            selection.select(&registry, &name).expect("select");
            assert_eq!(selection.current().map(|h| h.name().to_string()), Some(name));
        }
    }

    #[test]
    fn test_select_decodes_percent_encoding() {
        let registry = registry(&["Office Jet"]);
        let selection = SelectionState::new();

        let handle = selection.select(&registry, "Office%20Jet").expect("select");
        assert_eq!(handle.name(), "Office Jet");
        assert!(selection.is_selected());
    }

    #[test]
    fn test_unknown_name_clears_selection() {
        let registry = registry(&["Zebra"]);
        let selection = SelectionState::new();
        selection.select(&registry, "Zebra").expect("select");

        let err = selection.select(&registry, "Ghost").unwrap_err();
        assert!(matches!(err, SelectionError::NotFound { ref name } if name == "Ghost"));
        assert!(!selection.is_selected());
    }

    #[test]
    fn test_bad_encoding_is_a_decode_error_and_clears_selection() {
        let registry = registry(&["Zebra"]);
        let selection = SelectionState::new();
        selection.select(&registry, "Zebra").expect("select");

        let err = selection.select(&registry, "bad%encoding").unwrap_err();
        assert!(matches!(err, SelectionError::Decode(_)));
        assert!(selection.current().is_none());
    }

    #[test]
    fn test_decode_name() {
        assert_eq!(decode_name("Label%2FPrinter").unwrap(), "Label/Printer");
        assert_eq!(decode_name("plain").unwrap(), "plain");
        assert!(decode_name("trailing%2").is_err());
        assert!(decode_name("%").is_err());
        assert!(decode_name("%FF").is_err());
    }

    #[test]
    fn test_selection_survives_refresh() {
        let backend = MockPrinterBackend::new(["Zebra", "Laser"]);
        let registry = PrinterRegistry::new(Arc::new(backend.clone()));
        let selection = SelectionState::new();
        selection.select(&registry, "Laser").expect("select");

        backend.set_devices(["Zebra"]);
        registry.refresh();

        // The handle goes stale rather than being silently dropped.
        let stale = selection.current().expect("still selected");
        assert!(stale.create_job().is_err());
    }

    #[test]
    fn test_readers_are_not_blocked_by_a_cold_lookup() {
        let (backend, gate) = gated(&["Zebra"]);
        let registry = Arc::new(PrinterRegistry::new(Arc::new(backend)));
        let selection = Arc::new(SelectionState::new());

        let selecting = {
            let registry = registry.clone();
            let selection = selection.clone();
            std::thread::spawn(move || selection.select(&registry, "Zebra").map(|_| ()))
        };

        // Enumeration is now parked inside the backend; the selection must
        // still be readable.
        gate.entered.recv().expect("enumeration started");
        assert!(!selection.is_selected());
        assert!(selection.current().is_none());

        gate.release.send(()).expect("release enumeration");
        selecting.join().expect("select thread").expect("select");
        assert!(selection.is_selected());
    }

    #[test]
    fn test_clear() {
        let registry = registry(&["Zebra"]);
        let selection = SelectionState::new();
        selection.select(&registry, "Zebra").expect("select");
        selection.clear();
        assert!(!selection.is_selected());
    }
}
