use crate::Phase;

/// Result-dependent actions. All stay disabled until the job completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionAvailability {
    pub download: bool,
    pub view_diff: bool,
    pub open_urls: bool,
    pub save_to_project: bool,
}

impl ActionAvailability {
    pub fn all() -> Self {
        Self {
            download: true,
            view_diff: true,
            open_urls: true,
            save_to_project: true,
        }
    }

    pub fn any(&self) -> bool {
        self.download || self.view_diff || self.open_urls || self.save_to_project
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobProgressView {
    pub job_id: String,
    pub phase: Phase,
    pub status_label: Option<String>,
    pub progress_percentage: Option<f64>,
    pub processed_papers: Option<u64>,
    pub total_papers: Option<u64>,
    pub failed_papers: Option<u64>,
    pub log_text: String,
    pub message: Option<String>,
    pub progress_visible: bool,
    pub actions: ActionAvailability,
    pub attempts: u32,
    pub max_attempts: u32,
    pub dirty: bool,
}
