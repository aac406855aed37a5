// Build-time identity stamped into persisted batches

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `<name>/<version>`, written as `data_collection_version` in batch metadata.
pub fn data_collection_version() -> String {
    format!("{}/{}", NAME, VERSION)
}
