use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::AppConfig,
    connectivity::Connectivity,
    db::{DbPool, OrmConn},
    media::MediaClient,
    realtime::SubscriptionHub,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub media: MediaClient,
    pub hub: SubscriptionHub,
    pub connectivity: Connectivity,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        orm: OrmConn,
        config: AppConfig,
        media: MediaClient,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            pool,
            orm,
            config: Arc::new(config),
            media,
            hub: SubscriptionHub::new(),
            connectivity,
        }
    }
}

impl FromRef<AppState> for Connectivity {
    fn from_ref(state: &AppState) -> Self {
        state.connectivity.clone()
    }
}
