use axum::extract::FromRef;
use std::sync::Arc;

use crate::content::ContentAccessService;

use super::ServerConfig;

pub type GuardedContentService = Arc<ContentAccessService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub content: GuardedContentService,
}

impl ServerState {
    pub fn new(config: ServerConfig, content: GuardedContentService) -> Self {
        Self { config, content }
    }
}

impl FromRef<ServerState> for GuardedContentService {
    fn from_ref(input: &ServerState) -> Self {
        input.content.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
