//! Platform durable sync
//!
//! Maps "make these WAL bytes survive power loss" onto the strongest
//! primitive each platform offers.

use std::fs::File;
use std::io;

/// Convert a C-style status into `io::Result`.
#[allow(dead_code)]
fn check(ok: bool) -> io::Result<()> {
    if ok { Ok(()) } else { Err(io::Error::last_os_error()) }
}

/// Ensure written data reached persistent storage before returning.
///
/// - Linux: `fdatasync()` (data only, no metadata)
/// - macOS/iOS: `fcntl(F_FULLFSYNC)`; plain `fsync` stops at the drive cache
/// - Windows: `FlushFileBuffers()`
/// - Other: `File::sync_data()`
///
/// May block for a long time under heavy I/O; do not call while holding
/// locks that readers need.
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the fd comes from a live `File` borrow and stays open for the call.
        check(unsafe { libc::fdatasync(file.as_raw_fd()) } == 0)
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the fd comes from a live `File` borrow and stays open for the call.
        check(unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) } == 0)
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File` borrow and stays open for the call.
        check(unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) } != 0)
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows"
    )))]
    {
        file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_durable_sync_on_written_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"etrn").unwrap();

        let result = durable_sync(file.as_file());
        assert!(result.is_ok(), "durable_sync failed: {:?}", result.err());
    }
}
