//! OS page-cache release after artifact I/O.

use std::path::Path;

use tracing::trace;

/// Asks the kernel to drop cached pages for `path`.
///
/// Returns `true` if the advice was accepted. Failure is never an error.
#[cfg(target_os = "linux")]
pub fn release_page_cache(path: &Path) -> bool {
    use std::os::unix::io::AsRawFd;

    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "page cache release skipped");
            return false;
        }
    };

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
    if rc != 0 {
        trace!(path = %path.display(), rc, "posix_fadvise rejected");
        return false;
    }

    trace!(path = %path.display(), "page cache released");
    true
}

#[cfg(not(target_os = "linux"))]
pub fn release_page_cache(path: &Path) -> bool {
    trace!(path = %path.display(), "page cache release unsupported on this platform");
    false
}
