// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! Per-OS strategies for opening shared libraries and resolving their symbols.

use std::path::Path;
use std::sync::OnceLock;
use std::{ffi, io, ptr};

use crate::error::LoadError;

/// Used as a placeholder function pointer. This should **NEVER** be called directly,
/// and promptly cast into the correct function pointer type.
pub type FnPtr = unsafe extern "C" fn();

/// An opaque handle to a mapped shared library.
///
/// A handle only has meaning to the [`Platform`] that produced it.
#[derive(Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(ptr::NonNull<ffi::c_void>);

// internal type is opaque and managed by OS, so it's `Send` and `Sync` safe
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
	/// Wraps a raw handle, returning `None` if `raw` is null.
	#[inline]
	pub fn from_raw(raw: *mut ffi::c_void) -> Option<Self> {
		ptr::NonNull::new(raw).map(Self)
	}

	#[inline]
	pub fn as_raw(&self) -> *mut ffi::c_void {
		self.0.as_ptr()
	}
}

/// Used to specify the run-time loader strategy for [`Importer`](crate::Importer).
/// `Platform` can also be used to make custom strategies, such as test doubles.
///
/// # Safety
/// `resolve` must only return addresses of functions exported by the library behind
/// `handle`, and `close` must release the handle produced by `open`.
pub unsafe trait Platform {
	/// Attempts to map the shared library at `path`.
	///
	/// A bare file name is resolved through the OS default library search path.
	///
	/// # Safety
	/// Loading a library runs its initialization routines.
	unsafe fn open(&self, path: &Path) -> Result<Handle, LoadError>;
	/// Retrieves the address of `symbol`, or `None` if this build of the library
	/// doesn't export it.
	///
	/// # Safety
	/// `handle` must come from [`open`](Platform::open) on this platform and must not be closed.
	unsafe fn resolve(&self, handle: &Handle, symbol: &str) -> Option<FnPtr>;
	/// Releases the library.
	///
	/// # Safety
	/// No address resolved through `handle` may be called afterwards.
	unsafe fn close(&self, handle: Handle) -> io::Result<()>;
	/// Translates a logical library name into the OS file name, e.g. `zstd` into `libzstd.so`.
	fn translate_name(&self, name: &str) -> String;
}

/// Shared library naming of Windows: `name.dll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Windows;

impl Windows {
	#[inline]
	pub fn file_name(&self, name: &str) -> String {
		format!("{name}.dll")
	}
}

/// Shared library naming of POSIX systems: `libname.so`, or `libname.dylib` on Darwin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posix {
	ext: &'static str,
}

impl Posix {
	/// Constructs a strategy using a fixed library extension.
	#[inline]
	pub const fn with_extension(ext: &'static str) -> Self {
		Self { ext }
	}

	/// Constructs a strategy using the extension of the running kernel.
	#[cfg(unix)]
	#[inline]
	pub fn detect() -> Self {
		Self::with_extension(dylib_extension())
	}

	#[inline]
	pub const fn extension(&self) -> &'static str {
		self.ext
	}

	#[inline]
	pub fn file_name(&self, name: &str) -> String {
		format!("lib{name}.{}", self.ext)
	}
}

/// Library extension of the running kernel.
///
/// The `uname` probe runs once per process.
#[cfg(unix)]
pub fn dylib_extension() -> &'static str {
	static EXT: OnceLock<&'static str> = OnceLock::new();
	EXT.get_or_init(|| {
		let kernel = crate::os::imp::kernel_name();
		let ext = extension_for_kernel(kernel.as_deref().unwrap_or_default());
		tracing::trace!(?kernel, ext, "probed library extension");
		ext
	})
}

#[cfg_attr(not(unix), allow(dead_code))]
fn extension_for_kernel(kernel: &str) -> &'static str {
	if kernel == "Darwin" {
		"dylib"
	} else {
		"so"
	}
}

#[cfg(unix)]
unsafe impl Platform for Posix {
	unsafe fn open(&self, path: &Path) -> Result<Handle, LoadError> {
		crate::os::imp::dylib_open(path)
			.and_then(|raw| {
				Handle::from_raw(raw)
					.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "loader returned a null handle"))
			})
			.map_err(|e| LoadError::new(path, e.to_string()))
	}

	unsafe fn resolve(&self, handle: &Handle, symbol: &str) -> Option<FnPtr> {
		let addr = crate::os::imp::dylib_symbol(handle.as_raw(), symbol);
		// `FnPtr` is non-nullable, so a null address maps onto `None`.
		std::mem::transmute::<*mut ffi::c_void, Option<FnPtr>>(addr)
	}

	unsafe fn close(&self, handle: Handle) -> io::Result<()> {
		crate::os::imp::dylib_close(handle.as_raw())
	}

	#[inline]
	fn translate_name(&self, name: &str) -> String {
		self.file_name(name)
	}
}

#[cfg(windows)]
unsafe impl Platform for Windows {
	unsafe fn open(&self, path: &Path) -> Result<Handle, LoadError> {
		crate::os::imp::dylib_open(path)
			.and_then(|raw| {
				Handle::from_raw(raw)
					.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "loader returned a null handle"))
			})
			.map_err(|e| LoadError::new(path, e.to_string()))
	}

	unsafe fn resolve(&self, handle: &Handle, symbol: &str) -> Option<FnPtr> {
		let addr = crate::os::imp::dylib_symbol(handle.as_raw(), symbol);
		std::mem::transmute::<*mut ffi::c_void, Option<FnPtr>>(addr)
	}

	unsafe fn close(&self, handle: Handle) -> io::Result<()> {
		crate::os::imp::dylib_close(handle.as_raw())
	}

	#[inline]
	fn translate_name(&self, name: &str) -> String {
		self.file_name(name)
	}
}

/// The strategy of the running OS.
#[cfg(unix)]
pub type System = Posix;
/// The strategy of the running OS.
#[cfg(windows)]
pub type System = Windows;

/// Returns the strategy of the running OS, selected once per process.
pub fn system() -> System {
	static SYSTEM: OnceLock<System> = OnceLock::new();
	*SYSTEM.get_or_init(|| {
		#[cfg(unix)]
		{
			Posix::detect()
		}
		#[cfg(windows)]
		{
			Windows
		}
	})
}
