//! Process exit codes for the `qrtrust` binary.
//! These codes are part of the public contract; scripts branch on them.

pub const SUCCESS: i32 = 0;
pub const UNVERIFIED: i32 = 1; // Signature invalid, issuer unknown, or lookup not found
pub const CONFIG_ERROR: i32 = 2; // Bad flags, config file or environment
pub const CACHE_ERROR: i32 = 3; // Trust cache could not be opened or queried

/// Map a command failure to its exit code.
pub fn for_error(err: &anyhow::Error) -> i32 {
    if err
        .chain()
        .any(|cause| cause.downcast_ref::<qrtrust_core::CacheError>().is_some())
    {
        CACHE_ERROR
    } else {
        CONFIG_ERROR
    }
}
