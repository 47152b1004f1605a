//! C ABI entry points
//!
//! Pool processes load the verifier as a shared library and call these
//! symbols directly. Every entry point returns a plain value: failures are
//! logged and collapsed, and panics never cross the boundary.
//!
//! All calls share one process-wide verifier, so concurrent callers reuse the
//! same epoch context and serialize on its lock.

use crate::engine::RandomXEngine;
use crate::epoch::{epoch_of, seed_for};
use crate::error::Error;
use crate::verifier::{log_failure, ShareVerifier, VerifyError, CODE_INVALID};
use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{error, warn};

static VERIFIER: OnceLock<ShareVerifier<RandomXEngine>> = OnceLock::new();

fn verifier() -> &'static ShareVerifier<RandomXEngine> {
    VERIFIER.get_or_init(|| ShareVerifier::new(RandomXEngine::new()))
}

/// Borrow a NUL-terminated UTF-8 argument
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives the call.
unsafe fn c_str_arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, Error> {
    if ptr.is_null() {
        return Err(Error::format(format!("{} is a null pointer", name)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| Error::format(format!("{} is not valid UTF-8", name)))
}

/// Verify a share
///
/// Returns `1` when the commitment meets the target, `0` when it does not,
/// and `-1` for malformed input or when the share could not be verified.
///
/// # Safety
///
/// `header_hex` and `target_hex` must be null or point to NUL-terminated
/// strings valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn verify_share(
    header_hex: *const c_char,
    target_hex: *const c_char,
    epoch_duration: u32,
) -> i32 {
    let header = match c_str_arg(header_hex, "header") {
        Ok(s) => s,
        Err(e) => {
            log_failure(&VerifyError::InvalidHeader(e));
            return CODE_INVALID;
        }
    };
    let target = match c_str_arg(target_hex, "target") {
        Ok(s) => s,
        Err(e) => {
            log_failure(&VerifyError::InvalidTarget(e));
            return CODE_INVALID;
        }
    };

    panic::catch_unwind(AssertUnwindSafe(|| {
        verifier().verify_code(header, target, epoch_duration)
    }))
    .unwrap_or_else(|_| {
        error!("Share verification panicked");
        CODE_INVALID
    })
}

/// Release the hashing context; the next `verify_share` rebuilds it
#[no_mangle]
pub extern "C" fn cleanup_randomx() {
    if let Some(verifier) = VERIFIER.get() {
        if panic::catch_unwind(AssertUnwindSafe(|| verifier.teardown())).is_err() {
            error!("Releasing the hashing context panicked");
        }
    }
}

/// Epoch of a timestamp; `0` when `duration` is zero
#[no_mangle]
pub extern "C" fn calculate_epoch(timestamp: u32, duration: u32) -> u32 {
    epoch_of(timestamp, duration).unwrap_or_else(|e| {
        warn!("calculate_epoch: {}", e);
        0
    })
}

/// Write the 32-byte seed key of `epoch` to `output`
///
/// # Safety
///
/// `output` must be null or valid for writes of 32 bytes.
#[no_mangle]
pub unsafe extern "C" fn calculate_seed_hash(epoch: u32, output: *mut u8) {
    if output.is_null() {
        warn!("calculate_seed_hash: output is a null pointer");
        return;
    }
    let seed = seed_for(epoch);
    std::ptr::copy_nonoverlapping(seed.as_bytes().as_ptr(), output, seed.as_bytes().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn test_calculate_epoch() {
        assert_eq!(calculate_epoch(1_707_657_600, 604_800), 2823);
        assert_eq!(calculate_epoch(1_707_657_600, 0), 0);
    }

    #[test]
    fn test_calculate_seed_hash() {
        let mut output = [0u8; 32];
        unsafe { calculate_seed_hash(2823, output.as_mut_ptr()) };
        assert_eq!(
            hex::encode(output),
            "055dec9ffa2ece92bef34086e83b2f3d32b9d64f2e49fddd7a5217fbba2b51ba"
        );
        unsafe { calculate_seed_hash(2823, ptr::null_mut()) };
    }

    #[test]
    fn test_verify_share_rejects_bad_input_without_hashing() {
        let target = CString::new("ff".repeat(32)).unwrap();
        let short = CString::new("0".repeat(223)).unwrap();

        unsafe {
            assert_eq!(verify_share(ptr::null(), target.as_ptr(), 604_800), CODE_INVALID);
            assert_eq!(verify_share(short.as_ptr(), ptr::null(), 604_800), CODE_INVALID);
            assert_eq!(verify_share(short.as_ptr(), target.as_ptr(), 604_800), CODE_INVALID);
        }
        assert_eq!(verifier().stats().builds, 0);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        cleanup_randomx();
        cleanup_randomx();
    }
}
