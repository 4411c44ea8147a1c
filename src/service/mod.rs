//! Watch-channel lifecycle and incremental sync.

pub mod channel_locks;
pub mod registrar;
pub mod rotator;
pub mod sync_engine;

pub use channel_locks::ChannelLocks;
pub use registrar::{ChannelRegistrar, derive_channel_id};
pub use rotator::CredentialRotator;
pub use sync_engine::{Notification, SyncEngine, SyncReport};
