// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use super::RawHandle;
use std::os::unix::ffi::OsStrExt;
use std::{ffi, io, mem, path::Path, ptr};

#[cfg(not(any(target_os = "linux", target_os = "macos", target_env = "gnu")))]
use std::sync;

// `dlerror` state is only thread-local on some libcs.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_env = "gnu")))]
#[inline]
fn dylib_guard<'a>() -> sync::MutexGuard<'a, ()> {
	static LOCK: sync::Mutex<()> = sync::Mutex::new(());
	LOCK.lock().unwrap_or_else(sync::PoisonError::into_inner)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_env = "gnu"))]
#[inline(always)]
fn dylib_guard() {}

unsafe fn dylib_error() -> io::Error {
	let msg = libc::dlerror();
	if msg.is_null() {
		io::Error::new(io::ErrorKind::Other, "unknown dynamic loader error")
	} else {
		let e = ffi::CStr::from_ptr(msg).to_string_lossy().into_owned();
		io::Error::new(io::ErrorKind::Other, e)
	}
}

pub(crate) unsafe fn dylib_open(path: &Path) -> io::Result<RawHandle> {
	let c_str = ffi::CString::new(path.as_os_str().as_bytes())?;
	let _lock = dylib_guard();
	let _ = libc::dlerror(); // clear existing errors
	let handle = libc::dlopen(c_str.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL);
	if handle.is_null() {
		Err(dylib_error())
	} else {
		Ok(handle)
	}
}

/// Returns null when the symbol is absent.
pub(crate) unsafe fn dylib_symbol(lib_handle: RawHandle, name: &str) -> *mut ffi::c_void {
	match ffi::CString::new(name) {
		Ok(c_str) => libc::dlsym(lib_handle, c_str.as_ptr()),
		Err(_) => ptr::null_mut(),
	}
}

pub(crate) unsafe fn dylib_close(lib_handle: RawHandle) -> io::Result<()> {
	let _lock = dylib_guard();
	let _ = libc::dlerror(); // clear existing errors
	if libc::dlclose(lib_handle) != 0 {
		Err(dylib_error())
	} else {
		Ok(())
	}
}

/// Kernel name as reported by `uname`, e.g. `Linux` or `Darwin`.
pub(crate) fn kernel_name() -> io::Result<String> {
	let mut uts: libc::utsname = unsafe { mem::zeroed() };
	if unsafe { libc::uname(&mut uts) } != 0 {
		return Err(io::Error::last_os_error());
	}
	let name = unsafe { ffi::CStr::from_ptr(uts.sysname.as_ptr()) };
	Ok(name.to_string_lossy().into_owned())
}
