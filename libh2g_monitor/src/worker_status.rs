/// What the processing loop is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerPhase {
    #[default]
    Reading,
    /// Caught up with the file, polling for new data
    Waiting,
    Finished,
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "reading"),
            Self::Waiting => write!(f, "waiting for data"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub packets: u64,
    pub aligned_events: u64,
    pub phase: WorkerPhase,
}

impl WorkerStatus {
    pub fn new(
        progress: f32,
        run_number: i32,
        packets: u64,
        aligned_events: u64,
        phase: WorkerPhase,
    ) -> Self {
        Self {
            progress,
            run_number,
            packets,
            aligned_events,
            phase,
        }
    }
}
