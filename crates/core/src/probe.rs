//! Filesystem accessibility probes.
//!
//! Every question the core asks about the filesystem (does this directory
//! exist, may we read it, may we write it) goes through an [`AccessProbe`].
//! [`FsProbe`] answers from the running system; tests substitute a fixed
//! table of answers.

use std::path::Path;

/// Answers reachability questions for a path.
///
/// Implementations must not panic; an unanswerable question is `false`.
pub trait AccessProbe {
    /// `true` if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// `true` if the current process may read `path`.
    fn can_read(&self, path: &Path) -> bool;

    /// `true` if the current process may write `path`.
    fn can_write(&self, path: &Path) -> bool;
}

impl<P: AccessProbe + ?Sized> AccessProbe for &P {
    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn can_read(&self, path: &Path) -> bool {
        (**self).can_read(path)
    }

    fn can_write(&self, path: &Path) -> bool {
        (**self).can_write(path)
    }
}

/// Probe backed by the real filesystem.
///
/// On Unix the permission checks use `access(2)`, so they honour the real
/// uid/gid of the process as well as mount flags such as read-only remounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsProbe;

impl AccessProbe for FsProbe {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn can_read(&self, path: &Path) -> bool {
        #[cfg(unix)]
        {
            access(path, libc::R_OK)
        }
        #[cfg(not(unix))]
        {
            std::fs::metadata(path).is_ok()
        }
    }

    fn can_write(&self, path: &Path) -> bool {
        #[cfg(unix)]
        {
            access(path, libc::W_OK)
        }
        #[cfg(not(unix))]
        {
            std::fs::metadata(path)
                .map(|meta| !meta.permissions().readonly())
                .unwrap_or(false)
        }
    }
}

#[cfg(unix)]
fn access(path: &Path, mode: libc::c_int) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}
