use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::printers::{PrinterBackend, PrinterHandle};

/// Immutable view of the devices found by one enumeration.
#[derive(Debug, Default)]
struct Snapshot {
    order: Vec<String>,
    by_name: HashMap<String, PrinterHandle>,
}

impl Snapshot {
    fn build(handles: Vec<PrinterHandle>) -> Self {
        let mut snapshot = Snapshot::default();
        for handle in handles {
            let name = handle.name().to_string();
            // A repeated name keeps its first position but the newest handle.
            if snapshot.by_name.insert(name.clone(), handle).is_none() {
                snapshot.order.push(name);
            }
        }
        snapshot
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Name-keyed cache of the print devices the host exposes.
///
/// Populated lazily on first read, replaced wholesale by `refresh`.
pub struct PrinterRegistry {
    backend: Arc<dyn PrinterBackend>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl PrinterRegistry {
    pub fn new(backend: Arc<dyn PrinterBackend>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Re-enumerates the backend and swaps in the new device set.
    ///
    /// Returns the number of devices found.
    pub fn refresh(&self) -> usize {
        info!("Enumerating printers via {}", self.backend.type_name());
        let snapshot = Snapshot::build(self.backend.enumerate());
        for name in &snapshot.order {
            debug!("    > {}", name);
        }

        let count = snapshot.order.len();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        info!("Printer registry holds {} device(s)", count);
        count
    }

    /// Printer names in enumeration order.
    pub fn list(&self) -> Vec<String> {
        self.populated().order.clone()
    }

    pub fn lookup(&self, name: &str) -> Option<PrinterHandle> {
        self.populated().by_name.get(name).cloned()
    }

    pub fn clear(&self) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(Snapshot::default());
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.type_name()
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn populated(&self) -> Arc<Snapshot> {
        let snapshot = self.current();
        if !snapshot.is_empty() {
            return snapshot;
        }

        self.refresh();
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printers::MockPrinterBackend;

    #[test]
    fn test_list_populates_lazily() {
        let backend = MockPrinterBackend::new(["Zebra", "Laser"]);
        let registry = PrinterRegistry::new(Arc::new(backend));

        assert_eq!(registry.list(), vec!["Zebra", "Laser"]);
        assert_eq!(registry.lookup("Laser").map(|h| h.name().to_string()), Some("Laser".to_string()));
    }

    #[test]
    fn test_empty_host_lists_nothing() {
        let registry = PrinterRegistry::new(Arc::new(MockPrinterBackend::default()));
        assert!(registry.list().is_empty());
        assert!(registry.lookup("anything").is_none());
    }

    #[test]
    fn test_refresh_drops_removed_devices() {
        let backend = MockPrinterBackend::new(["Zebra", "Laser"]);
        let registry = PrinterRegistry::new(Arc::new(backend.clone()));
        assert!(registry.lookup("Laser").is_some());

        backend.set_devices(["Zebra"]);
        assert_eq!(registry.refresh(), 1);

        assert!(registry.lookup("Laser").is_none());
        assert!(registry.lookup("Zebra").is_some());
        assert_eq!(registry.list(), vec!["Zebra"]);
    }

    #[test]
    fn test_cache_is_not_refreshed_implicitly() {
        let backend = MockPrinterBackend::new(["Zebra"]);
        let registry = PrinterRegistry::new(Arc::new(backend.clone()));
        assert_eq!(registry.list(), vec!["Zebra"]);

        backend.set_devices(["Zebra", "Laser"]);
        assert_eq!(registry.list(), vec!["Zebra"]);
        assert!(registry.lookup("Laser").is_none());
    }

    #[test]
    fn test_duplicate_names_keep_first_position() {
        let backend = MockPrinterBackend::new(["A", "B", "A"]);
        let registry = PrinterRegistry::new(Arc::new(backend));
        assert_eq!(registry.refresh(), 2);
        assert_eq!(registry.list(), vec!["A", "B"]);
    }

    #[test]
    fn test_clear_forces_reenumeration() {
        let backend = MockPrinterBackend::new(["Zebra"]);
        let registry = PrinterRegistry::new(Arc::new(backend.clone()));
        assert_eq!(registry.list(), vec!["Zebra"]);

        backend.set_devices(["Laser"]);
        registry.clear();
        assert_eq!(registry.list(), vec!["Laser"]);
    }
}
