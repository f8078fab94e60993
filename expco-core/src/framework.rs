use sqlx::PgPool;

/// Runs entity queries against the pool.
///
/// Every query type in [`crate::entities`] is a `kanau::processor::Processor`
/// input for this type.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
