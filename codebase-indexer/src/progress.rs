use std::sync::Arc;

/// Progress callback for indexing operations
pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

/// Indexing progress information
#[derive(Debug, Clone, PartialEq)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub current: usize,
    pub total: usize,
    pub current_file: Option<String>,
}

impl IndexProgress {
    /// Completion of the current phase, 0–100
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.current.min(self.total) as f32 / self.total as f32) * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Discovering,
    Chunking,
    Prioritizing,
    Embedding,
    Storing,
    Complete,
}

#[derive(Clone, Default)]
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn report(
        &self,
        phase: IndexPhase,
        current: usize,
        total: usize,
        current_file: Option<&str>,
    ) {
        if let Some(cb) = &self.callback {
            cb(IndexProgress {
                phase,
                current,
                total,
                current_file: current_file.map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn test_percent() {
        let progress = |current, total| IndexProgress {
            phase: IndexPhase::Embedding,
            current,
            total,
            current_file: None,
        };
        assert_eq!(progress(0, 4).percent(), 0.0);
        assert_eq!(progress(1, 4).percent(), 25.0);
        assert_eq!(progress(9, 4).percent(), 100.0);
        assert_eq!(progress(0, 0).percent(), 100.0);
    }

    #[test]
    fn test_reporter_forwards_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Some(Arc::new(move |p: IndexProgress| {
            sink.lock().unwrap().push((p.phase, p.current_file));
        })));

        reporter.report(IndexPhase::Chunking, 1, 2, Some("src/a.rs"));
        reporter.report(IndexPhase::Complete, 2, 2, None);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (IndexPhase::Chunking, Some("src/a.rs".to_string())),
                (IndexPhase::Complete, None),
            ]
        );
        ProgressReporter::default().report(IndexPhase::Storing, 0, 0, None);
    }
}
