use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::repository::ItineraryRepository;

pub struct AppState {
    pub repo: Arc<dyn ItineraryRepository>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(repo: Arc<dyn ItineraryRepository>, verifier: Arc<dyn TokenVerifier>) -> Arc<Self> {
        Arc::new(Self { repo, verifier })
    }
}
