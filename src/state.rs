use crate::config::Config;
use crate::services::exam::ExamService;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub exam: ExamService,
    pub config: Config,
}

impl FromRef<AppState> for ExamService {
    fn from_ref(state: &AppState) -> Self {
        state.exam.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
