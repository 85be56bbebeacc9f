use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, storage::Storage};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub storage: Storage,
    pub config: Arc<Config>,
}
