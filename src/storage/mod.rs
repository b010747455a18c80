mod store;
mod types;

pub use store::CredentialStore;
pub use types::StorageConfig;
