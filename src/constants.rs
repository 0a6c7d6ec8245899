//! Internal constants shared across the cache, pool, and executor.
//!
//! Named after, and numerically identical to, the constants the original
//! `easyhttpcpp` source hard-codes in `HttpInternalConstants`.

/// Extension appended to a cache-key to form its payload file name.
pub const CACHE_DATA_FILE_EXTENSION: &str = ".data";
/// Directory (relative to the cache root) holding committed payload files.
pub const CACHE_DIR: &str = "cache";
/// Directory (relative to the cache root) holding in-progress payload writes.
pub const TEMP_DIR: &str = "temp";

/// File name of the metadata store, relative to the cache root.
pub const DB_FILE_NAME: &str = "cache_metadata.db";
/// Table name within the metadata store.
pub const DB_TABLE_NAME: &str = "cache_metadata";
/// Current schema version. Opening an older version is a no-op upgrade hook.
pub const DB_SCHEMA_VERSION: u32 = 1;

/// Default core size of the async worker pool.
pub const ASYNC_CORE_POOL_SIZE: usize = 2;
/// Default maximum size of the async worker pool.
pub const ASYNC_MAX_POOL_SIZE: usize = 5;

/// Maximum number of retries the request executor will perform before
/// failing with an `Execution` error (six total attempts: the first try
/// plus up to this many retries).
pub const MAX_RETRY_COUNT: u32 = 5;
