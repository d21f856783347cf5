use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    services::token_service::TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(pool: DbPool, config: &AppConfig) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl_seconds);
        Self::with_tokens(pool, tokens)
    }

    pub fn with_tokens(pool: DbPool, tokens: TokenService) -> Self {
        let orm = orm_from_pool(&pool);
        Self {
            pool,
            orm,
            tokens: Arc::new(tokens),
        }
    }
}
