//! Pool placement for new writes.

use stratus_meta::types::StorageClass;

/// Pool for small objects; kept on fast media.
pub const SMALL_FILE_POOL: &str = "smallfile";

/// Pool for everything else in the Standard and IA classes.
pub const BIG_FILE_POOL: &str = "bigfile";

/// Pool for Glacier-class objects.
pub const GLACIER_POOL: &str = "glacier";

/// Objects below this size route to the small-file pool.
pub const SMALL_OBJECT_THRESHOLD: i64 = 128 << 10;

/// Choose the pool for a new write. `size < 0` means unknown (multipart
/// create), which always routes to the big-file pool.
#[must_use]
pub fn pick_pool(storage_class: StorageClass, size: i64) -> &'static str {
    if storage_class == StorageClass::Glacier {
        return GLACIER_POOL;
    }
    if (0..SMALL_OBJECT_THRESHOLD).contains(&size) {
        SMALL_FILE_POOL
    } else {
        BIG_FILE_POOL
    }
}
