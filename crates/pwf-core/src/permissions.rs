//! Write-permission bits as the protection flag.
//!
//! On unix, locking clears every write bit and unlocking grants owner and
//! group write. Elsewhere the readonly attribute is toggled.

use crate::error::{IoResultExt, Result};
use std::fs::{self, Metadata};
use std::path::Path;

#[cfg(unix)]
const WRITE_BITS: u32 = 0o222;
#[cfg(unix)]
const UNLOCK_BITS: u32 = 0o220;

pub fn is_writable(metadata: &Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & WRITE_BITS != 0
    }
    #[cfg(not(unix))]
    {
        !metadata.permissions().readonly()
    }
}

pub fn lock(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).at(path)?;
    let mut permissions = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() & !WRITE_BITS);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(true);
    }
    fs::set_permissions(path, permissions).at(path)
}

pub fn unlock(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).at(path)?;
    let mut permissions = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | UNLOCK_BITS);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(false);
    }
    fs::set_permissions(path, permissions).at(path)
}

/// `ls -l` style mode string, e.g. `drwxr-xr-x`.
pub fn filemode(metadata: &Metadata) -> String {
    let kind = if metadata.is_dir() {
        'd'
    } else if metadata.file_type().is_symlink() {
        'l'
    } else {
        '-'
    };
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode()
    };
    #[cfg(not(unix))]
    let mode: u32 = if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
