//! Repository traits for metadata operations.

pub mod bindings;
pub mod files;
pub mod sync_state;

pub use bindings::BindingRepo;
pub use files::FileRepo;
pub use sync_state::SyncStateRepo;
