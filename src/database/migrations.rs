//! Bundled schema migrations for the `outbox` table.
//!
//! Plain versioned `.sql` files under `migrations/` at the crate root,
//! embedded at compile time and applied with `sqlx::migrate!`.

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
