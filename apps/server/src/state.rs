//! Shared application state.

use std::sync::Arc;

use tally_db::Database;

use crate::auth::JwtManager;

/// State handed to every handler.
///
/// Cloned per request; both fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, jwt: JwtManager) -> Self {
        AppState {
            db,
            jwt: Arc::new(jwt),
        }
    }
}
