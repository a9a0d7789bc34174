use crate::cleanup::{track_partial_file, untrack_partial_file};
use chanvid::TransferProgress;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{prefix} {bar:40.cyan/blue} {bytes}/{total_bytes} ({percent:>3}%) [{elapsed_precise}] ({eta}) {bytes_per_sec}{msg}";

pub fn create_progress_bar(total: u64, start: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_prefix(format_label(label));
    if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("##-"));
    }
    if start > 0 {
        pb.set_message(format!(" (resumed at {start})"));
    }
    pb.set_position(start);
    pb.reset_eta();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn format_label(label: &str) -> String {
    const MAX: usize = 25;
    if label.chars().count() <= MAX {
        return label.to_string();
    }
    let mut truncated = label.chars().rev().take(MAX - 3).collect::<String>();
    truncated = truncated.chars().rev().collect();
    format!("...{}", truncated)
}

/// One terminal bar per file. While a bar is live its path sits in the
/// partial-file registry so an abort can name it.
#[derive(Default)]
pub struct BarProgress {
    current: RefCell<Option<(ProgressBar, PathBuf)>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferProgress for BarProgress {
    fn begin(&self, path: &Path, start: u64, total: u64) {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        track_partial_file(path);
        let bar = create_progress_bar(total, start, &label);
        *self.current.borrow_mut() = Some((bar, path.to_path_buf()));
    }

    fn advance(&self, written: u64, _total: u64) {
        if let Some((bar, _)) = self.current.borrow().as_ref() {
            bar.set_position(written);
        }
    }

    fn finish(&self, _written: u64, _total: u64, completed: bool) {
        if let Some((bar, path)) = self.current.borrow_mut().take() {
            bar.finish_and_clear();
            if completed {
                untrack_partial_file(&path);
            }
        }
    }
}
