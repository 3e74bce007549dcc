// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use std::{fmt, io};

use crate::platform::{FnPtr, Handle, Platform};

/// An object owning one opened shared library.
///
/// The library is released exactly once: by [`close`](Library::close), or when the
/// `Library` is dropped. If unloading is suppressed the library stays mapped until
/// the process exits, which keeps function pointers copied out of it valid.
pub struct Library<P: Platform> {
	platform: P,
	// `None` only once released
	hlib: Option<Handle>,
	unload: bool,
}

impl<P: Platform> Library<P> {
	/// Takes ownership of `handle`.
	///
	/// # Safety
	/// `handle` must have been produced by `platform.open` and must not be owned elsewhere.
	#[inline]
	pub unsafe fn from_raw_parts(platform: P, handle: Handle, unload: bool) -> Self {
		Self {
			platform,
			hlib: Some(handle),
			unload,
		}
	}

	#[inline]
	pub fn platform(&self) -> &P {
		&self.platform
	}

	#[inline]
	pub fn handle(&self) -> Option<&Handle> {
		self.hlib.as_ref()
	}

	/// Returns `false` if this library is never unloaded.
	#[inline]
	pub fn unloads(&self) -> bool {
		self.unload
	}

	/// Retrieves the address of `name`, or `None` if the library doesn't export it.
	pub fn symbol(&self, name: &str) -> Option<FnPtr> {
		let handle = self.hlib.as_ref()?;
		unsafe { self.platform.resolve(handle, name) }
	}

	/// Releases the library now, reporting the OS error if it fails.
	///
	/// Does nothing if unloading is suppressed.
	pub fn close(mut self) -> io::Result<()> {
		match self.hlib.take() {
			Some(handle) if self.unload => unsafe { self.platform.close(handle) },
			_ => Ok(()),
		}
	}

	/// Keeps the library mapped for the rest of the process.
	#[inline]
	pub fn leak(mut self) {
		self.unload = false;
	}

	/// Gives up ownership of the handle without releasing it.
	#[cfg(feature = "unstable")]
	pub fn into_raw(mut self) -> Handle {
		self.unload = false;
		match self.hlib.take() {
			Some(handle) => handle,
			None => unreachable!("`Library` outlived its handle"),
		}
	}
}

impl<P: Platform> Drop for Library<P> {
	fn drop(&mut self) {
		let Some(handle) = self.hlib.take() else {
			return;
		};
		if !self.unload {
			tracing::debug!(handle = ?handle.as_raw(), "leaving native library mapped");
			return;
		}
		if let Err(e) = unsafe { self.platform.close(handle) } {
			tracing::warn!(error = %e, "failed to unload native library");
		}
	}
}

impl<P: Platform + fmt::Debug> fmt::Debug for Library<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Library")
			.field("platform", &self.platform)
			.field("handle", &self.hlib.as_ref().map(Handle::as_raw))
			.field("unload", &self.unload)
			.finish()
	}
}
