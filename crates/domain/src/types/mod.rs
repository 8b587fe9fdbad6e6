//! Domain types and models

pub mod connection;
pub mod event;
pub mod item;
pub mod mapping;
pub mod sync;

pub use connection::{
    AccessToken, CalendarConnection, ConnectionState, ConnectionStatus, NewConnection, TokenGrant,
};
pub use event::{EventPayload, EventQuery, RemoteEvent};
pub use item::{ItemKey, ItemKind, Priority, SyncableItem};
pub use mapping::EventMapping;
pub use sync::{
    ActionKind, PlanEntry, SyncAbort, SyncAction, SyncErrorKind, SyncFailure, SyncResult, SyncRun,
    SyncRunStatus, SyncTrigger,
};
