use crate::modules::transcode::progress::ProgressState;

#[derive(Clone)]
pub struct AppState {
    pub progress: ProgressState,
}

impl AppState {
    pub fn new(progress: ProgressState) -> Self {
        Self { progress }
    }
}
