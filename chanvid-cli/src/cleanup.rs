use chanvid::StopSignal;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once, OnceLock};

static SIGNAL_HANDLER: Once = Once::new();
static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);
static PARTIAL_FILE_REGISTRY: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

/// First Ctrl+C asks the batch to stop once the chunk in flight is on disk.
/// A second one exits straight away, leaving partial files for a later resume.
pub fn install_signal_handler(stop: StopSignal) {
    SIGNAL_HANDLER.call_once(|| {
        if let Err(err) = ctrlc::set_handler(move || {
            if INTERRUPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                stop.stop();
                eprintln!("Stopping after the current chunk; press Ctrl+C again to abort now.");
                return;
            }
            report_preserved(&take_partial_files(), "Operation cancelled");
            std::process::exit(130);
        }) {
            eprintln!("failed to install Ctrl+C handler: {err}");
        }
    });
}

fn partial_registry() -> &'static Mutex<HashSet<PathBuf>> {
    PARTIAL_FILE_REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

pub fn track_partial_file(path: &Path) {
    if let Ok(mut registry) = partial_registry().lock() {
        registry.insert(path.to_path_buf());
    }
}

pub fn untrack_partial_file(path: &Path) {
    if let Ok(mut registry) = partial_registry().lock() {
        registry.remove(path);
    }
}

/// Drains the registry; paths come back sorted for stable output.
pub fn take_partial_files() -> Vec<PathBuf> {
    let mut kept = Vec::new();
    if let Ok(mut registry) = partial_registry().lock() {
        kept.extend(registry.drain());
    }
    kept.sort();
    kept
}

pub fn report_preserved(kept: &[PathBuf], headline: &str) {
    if kept.is_empty() {
        eprintln!("{headline}.");
    } else {
        eprintln!("{headline}; partial file(s) preserved for resume:");
        for path in kept {
            eprintln!("  {}", path.display());
        }
    }
}
