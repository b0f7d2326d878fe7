use sqlx::PgPool;

/// Cloneable (the pool is already `Arc`-backed internally) handle shared
/// across every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
