// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::borrow::Cow;
use std::os::windows::ffi::OsStrExt;
use std::{ffi, io, path::Path, ptr};

use super::RawHandle;

mod c;

fn to_wide(path: &ffi::OsStr) -> Vec<u16> {
	path.encode_wide().chain(std::iter::once(0u16)).collect()
}

// Bare names go through the default DLL search order. Qualified paths pull their
// dependencies from their own directory, and that flag needs an absolute path.
fn load_target(path: &Path) -> io::Result<(Cow<'_, Path>, c::DWORD)> {
	if path.parent().map_or(true, |p| p.as_os_str().is_empty()) {
		Ok((Cow::Borrowed(path), 0))
	} else if path.is_absolute() {
		Ok((Cow::Borrowed(path), c::LOAD_WITH_ALTERED_SEARCH_PATH))
	} else {
		Ok((Cow::Owned(std::path::absolute(path)?), c::LOAD_WITH_ALTERED_SEARCH_PATH))
	}
}

pub(crate) unsafe fn dylib_open(path: &Path) -> io::Result<RawHandle> {
	let (target, flags) = load_target(path)?;
	let wide_str: Vec<u16> = to_wide(target.as_os_str());
	let handle = c::LoadLibraryExW(wide_str.as_ptr(), ptr::null_mut(), flags);
	if handle.is_null() {
		Err(io::Error::last_os_error())
	} else {
		Ok(handle)
	}
}

/// Returns null when the symbol is absent.
pub(crate) unsafe fn dylib_symbol(lib_handle: RawHandle, name: &str) -> *mut ffi::c_void {
	match ffi::CString::new(name) {
		Ok(c_str) => c::GetProcAddress(lib_handle, c_str.as_ptr()).cast_mut(),
		Err(_) => ptr::null_mut(),
	}
}

pub(crate) unsafe fn dylib_close(lib_handle: RawHandle) -> io::Result<()> {
	if c::FreeLibrary(lib_handle) == 0 {
		Err(io::Error::last_os_error())
	} else {
		Ok(())
	}
}
