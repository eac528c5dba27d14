pub mod keytool_store;
#[cfg(test)]
pub mod memory_store;
pub mod store_trait;

// Re-export stores
pub use keytool_store::KeytoolStore;
pub use store_trait::Keystore;
