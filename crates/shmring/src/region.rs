//! Named shared-memory region lifecycle.
//!
//! A [`Region`] owns a mapped byte range identified by a process-independent
//! name. It does not interpret the bytes it maps — that is [`crate::ring`]'s
//! job. Two platform backends exist: POSIX `shm_open`/`mmap` and Win32
//! `CreateFileMappingW`/`MapViewOfFile`.

use std::fmt;

use thiserror::Error;

/// Failure categories for region construction, matching the status values a
/// caller can observe after `create`/`open`.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The name failed ASCII/length validation before any OS call was made.
    #[error("invalid region name: {0}")]
    InvalidName(String),
    /// The named region could not be created (`shm_open`/`CreateFileMappingW`
    /// failed).
    #[error("failed to create region {name}: {source}")]
    CreationFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
    /// An existing named region could not be opened.
    #[error("failed to open region {name}: {source}")]
    OpenFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
    /// The region's size could not be set (`ftruncate` or equivalent).
    #[error("failed to size region {name} to {size} bytes: {source}")]
    SizeSetFailed {
        name: String,
        size: usize,
        #[source]
        source: std::io::Error,
    },
    /// The region could not be mapped into this process's address space.
    #[error("failed to map region {name}: {source}")]
    MappingFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum length of a region name, per the external naming contract.
pub const MAX_NAME_LEN: usize = 62;

/// Validate and normalise a region name for the current platform.
///
/// POSIX names are prefixed with `/`; Win32 names have any leading `/`
/// stripped. The caller-facing name is ASCII-only and at most
/// [`MAX_NAME_LEN`] bytes, checked before normalisation.
fn normalize_name(name: &str) -> Result<String, RegionError> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_LEN {
        return Err(RegionError::InvalidName(name.to_string()));
    }
    if !trimmed.is_ascii() {
        return Err(RegionError::InvalidName(name.to_string()));
    }
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
    {
        return Err(RegionError::InvalidName(name.to_string()));
    }

    #[cfg(unix)]
    {
        Ok(format!("/{trimmed}"))
    }
    #[cfg(windows)]
    {
        Ok(trimmed.to_string())
    }
}

/// A mapped, named shared-memory region.
///
/// Move-only: there is no `Clone`, and `base`/`len` are only ever handed out
/// as a raw pointer plus length for [`crate::ring::RingView`] to interpret.
/// Dropping a `Region` unmaps it; if it was created (not opened) and
/// `persist` was false, dropping also removes the name from the namespace.
pub struct Region {
    name: String,
    base: *mut u8,
    len: usize,
    persist: bool,
    created: bool,
    backend: backend::Handle,
}

// SAFETY: the mapping is read/write shared memory; synchronization of the
// bytes themselves is the ring protocol's job, not this type's.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("persist", &self.persist)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl Region {
    /// Create a new named region of exactly `size` bytes, mapped read/write.
    ///
    /// Any stale region left behind under the same name (e.g. from a process
    /// that crashed without calling `destroy`) is removed first.
    pub fn create(name: &str, size: usize, persist: bool) -> Result<Self, RegionError> {
        let normalized = normalize_name(name)?;
        log::debug!("creating region {normalized} ({size} bytes, persist={persist})");
        let (base, backend) = backend::create(&normalized, size)?;
        Ok(Self {
            name: normalized,
            base,
            len: size,
            persist,
            created: true,
            backend,
        })
    }

    /// Open an existing named region. `size_hint == 0` auto-detects the size
    /// from the region's own metadata.
    pub fn open(name: &str, size_hint: usize) -> Result<Self, RegionError> {
        let normalized = normalize_name(name)?;
        log::debug!("opening region {normalized} (size_hint={size_hint})");
        let (base, len, backend) = backend::open(&normalized, size_hint)?;
        Ok(Self {
            name: normalized,
            base,
            len,
            persist: true,
            created: false,
            backend,
        })
    }

    /// Raw base pointer to the mapped range.
    pub fn as_ptr(&self) -> *mut u8 {
        self.base
    }

    /// Total mapped length in bytes, including the 16-byte header.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove the name from the namespace so future opens fail. Already-held
    /// mappings (this one included, until dropped) remain valid.
    pub fn destroy(&mut self) {
        if self.created {
            log::debug!("destroying region {}", self.name);
            backend::unlink(&self.name);
            self.persist = false;
        }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        backend::unmap(self.base, self.len);
        if self.created && !self.persist {
            backend::unlink(&self.name);
        }
    }
}

#[cfg(unix)]
mod backend {
    use super::RegionError;
    use std::ffi::CString;
    use std::io;
    use std::os::unix::io::RawFd;

    pub(super) struct Handle {
        fd: RawFd,
    }

    pub(super) fn create(
        name: &str,
        size: usize,
    ) -> Result<(*mut u8, Handle), RegionError> {
        let c_name = CString::new(name).map_err(|_| RegionError::InvalidName(name.to_string()))?;

        // Drop any stale region before creating: some kernels refuse a
        // resize after a prior open, so we want a fresh object.
        unsafe {
            libc::shm_unlink(c_name.as_ptr());
        }

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            return Err(RegionError::CreationFailed {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        if unsafe { libc::ftruncate(fd, size as libc::off_t) } < 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(RegionError::SizeSetFailed {
                name: name.to_string(),
                size,
                source: err,
            });
        }

        let base = map(fd, size, name)?;
        Ok((base, Handle { fd }))
    }

    pub(super) fn open(
        name: &str,
        size_hint: usize,
    ) -> Result<(*mut u8, usize, Handle), RegionError> {
        let c_name = CString::new(name).map_err(|_| RegionError::InvalidName(name.to_string()))?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(RegionError::OpenFailed {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let size = if size_hint == 0 {
            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            if unsafe { libc::fstat(fd, &mut stat) } < 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(RegionError::OpenFailed {
                    name: name.to_string(),
                    source: err,
                });
            }
            stat.st_size as usize
        } else {
            size_hint
        };

        let base = match map(fd, size, name) {
            Ok(base) => base,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };
        Ok((base, size, Handle { fd }))
    }

    fn map(fd: RawFd, size: usize, name: &str) -> Result<*mut u8, RegionError> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(RegionError::MappingFailed {
                name: name.to_string(),
                source: err,
            });
        }
        Ok(ptr as *mut u8)
    }

    pub(super) fn unmap(base: *mut u8, len: usize) {
        unsafe {
            libc::munmap(base as *mut libc::c_void, len);
        }
    }

    pub(super) fn unlink(name: &str) {
        if let Ok(c_name) = CString::new(name) {
            unsafe {
                libc::shm_unlink(c_name.as_ptr());
            }
        }
    }

    impl Drop for Handle {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

#[cfg(windows)]
mod backend {
    use super::RegionError;
    use std::io;
    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
    use windows_sys::Win32::System::Memory::{
        CreateFileMappingW, FILE_MAP_READ, FILE_MAP_WRITE, MapViewOfFile, OpenFileMappingW,
        PAGE_READWRITE, UnmapViewOfFile,
    };

    pub(super) struct Handle {
        mapping: HANDLE,
    }

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Win32 has no unlink-by-name primitive; a named mapping lives until the
    /// last handle referencing it closes. `destroy`/`Drop`'s unlink step is
    /// therefore a no-op on this platform.
    pub(super) fn unlink(_name: &str) {}

    pub(super) fn create(
        name: &str,
        size: usize,
    ) -> Result<(*mut u8, Handle), RegionError> {
        let wide_name = wide(name);
        let high = (size >> 32) as u32;
        let low = (size & 0xFFFF_FFFF) as u32;

        let mapping = unsafe {
            CreateFileMappingW(
                windows_sys::Win32::Foundation::INVALID_HANDLE_VALUE,
                std::ptr::null(),
                PAGE_READWRITE,
                high,
                low,
                wide_name.as_ptr(),
            )
        };
        if mapping == 0 {
            return Err(RegionError::CreationFailed {
                name: name.to_string(),
                source: io::Error::from_raw_os_error(unsafe { GetLastError() } as i32),
            });
        }

        let base = map(mapping, size, name)?;
        Ok((base, Handle { mapping }))
    }

    /// Win32 has no API that reports a named section's exact byte length:
    /// `VirtualQuery`'s `RegionSize` is the page-rounded size of the
    /// committed view (e.g. 4096 for an 80-byte region), not the section's
    /// true size, so it cannot stand in for `fstat` the way the POSIX
    /// backend uses it. Auto-detection (`size_hint == 0`) is therefore not
    /// supported on this platform; callers must pass the real total size.
    pub(super) fn open(
        name: &str,
        size_hint: usize,
    ) -> Result<(*mut u8, usize, Handle), RegionError> {
        if size_hint == 0 {
            return Err(RegionError::OpenFailed {
                name: name.to_string(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Windows requires an explicit size_hint; named section sizes cannot be auto-detected",
                ),
            });
        }

        let wide_name = wide(name);
        let mapping =
            unsafe { OpenFileMappingW(FILE_MAP_READ | FILE_MAP_WRITE, 0, wide_name.as_ptr()) };
        if mapping == 0 {
            return Err(RegionError::OpenFailed {
                name: name.to_string(),
                source: io::Error::from_raw_os_error(unsafe { GetLastError() } as i32),
            });
        }

        let base = match map(mapping, size_hint, name) {
            Ok(base) => base,
            Err(e) => {
                unsafe { CloseHandle(mapping) };
                return Err(e);
            }
        };

        Ok((base, size_hint, Handle { mapping }))
    }

    fn map(mapping: HANDLE, size: usize, name: &str) -> Result<*mut u8, RegionError> {
        let ptr = unsafe { MapViewOfFile(mapping, FILE_MAP_READ | FILE_MAP_WRITE, 0, 0, size) };
        if ptr.Value.is_null() {
            return Err(RegionError::MappingFailed {
                name: name.to_string(),
                source: io::Error::from_raw_os_error(unsafe { GetLastError() } as i32),
            });
        }
        Ok(ptr.Value as *mut u8)
    }

    pub(super) fn unmap(base: *mut u8, _len: usize) {
        unsafe {
            UnmapViewOfFile(base as *const _);
        }
    }

    impl Drop for Handle {
        fn drop(&mut self) {
            unsafe {
                CloseHandle(self.mapping);
            }
        }
    }
}
