//! Permission probes for the current process.

use std::path::Path;

/// Whether the process may read `path`.
pub fn can_read(path: &Path) -> bool {
    check(path, Mode::Read)
}

/// Whether the process may modify `path` (create or remove entries, for a directory).
pub fn can_write(path: &Path) -> bool {
    check(path, Mode::Write)
}

/// Whether the process runs with an effective user id of 0.
#[cfg(unix)]
pub fn is_superuser() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_superuser() -> bool {
    false
}

enum Mode {
    Read,
    Write,
}

#[cfg(unix)]
fn check(path: &Path, mode: Mode) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(path_cstr) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    let mode = match mode {
        Mode::Read => libc::R_OK,
        Mode::Write => libc::W_OK,
    };
    // SAFETY: path_cstr is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(path_cstr.as_ptr(), mode) == 0 }
}

#[cfg(not(unix))]
fn check(path: &Path, mode: Mode) -> bool {
    match mode {
        Mode::Read => std::fs::File::open(path).is_ok(),
        Mode::Write => std::fs::metadata(path)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false),
    }
}
