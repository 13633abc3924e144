pub mod postgres;
pub mod traits;

pub use postgres::PostgresOutboxRepository;
pub use traits::OutboxRepository;
