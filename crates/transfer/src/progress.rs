/// Progress snapshot pushed after every successful chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub message: String,
    pub chunks_completed: usize,
    pub total_chunks: usize,
    pub total_files: usize,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    /// Rounded, 0-100.
    pub percentage: u8,
}

/// Callback invoked with each progress update.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Rounded completion percentage; 100 when there is nothing to do.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (completed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Turns chunk counters into status updates for a notification surface.
///
/// Keeps only the high-water mark needed to guarantee that the reported
/// percentage never goes backwards within one transaction.
pub struct ProgressReporter {
    callbacks: Vec<ProgressCallback>,
    last_percentage: u8,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            last_percentage: 0,
        }
    }

    /// Registers a progress callback.
    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.callbacks.push(callback);
    }

    /// Computes and pushes an update.
    pub fn report(
        &mut self,
        chunks_completed: usize,
        total_chunks: usize,
        total_files: usize,
        uploaded_bytes: u64,
        total_bytes: u64,
    ) -> ProgressUpdate {
        self.last_percentage = self
            .last_percentage
            .max(percentage(chunks_completed, total_chunks));
        let pct = self.last_percentage;

        let update = ProgressUpdate {
            message: status_message(total_files, pct),
            chunks_completed,
            total_chunks,
            total_files,
            uploaded_bytes,
            total_bytes,
            percentage: pct,
        };

        for cb in &self.callbacks {
            cb(update.clone());
        }
        update
    }
}

fn status_message(total_files: usize, pct: u8) -> String {
    format!("Uploading {total_files} file(s): {pct}% complete")
}
