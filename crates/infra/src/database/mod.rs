//! Database implementations

pub mod connection_repository;
pub mod event_mapping_repository;
pub mod manager;
pub(crate) mod sql;
pub mod sync_run_repository;
pub mod work_item_repository;

pub use connection_repository::SqliteTokenStore;
pub use event_mapping_repository::SqliteEventMappingRepository;
pub use manager::{DbManager, SqliteConnection, SqlitePool};
pub use sync_run_repository::SqliteSyncRunRepository;
pub use work_item_repository::SqliteWorkItemSource;
