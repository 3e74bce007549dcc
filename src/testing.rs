// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

// Test double standing in for the OS loader.

use std::collections::HashMap;
use std::ffi::c_int;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::{io, mem};

use crate::error::LoadError;
use crate::platform::{FnPtr, Handle, Platform, Posix};

#[derive(Default)]
struct State {
	// path -> exported symbols
	libraries: HashMap<PathBuf, Vec<(&'static str, FnPtr)>>,
	// handle id -> path
	open: HashMap<usize, PathBuf>,
	next_id: usize,
	closed: usize,
	failing_close: bool,
}

#[derive(Clone, Default)]
pub(crate) struct Fake(Arc<Mutex<State>>);

impl std::fmt::Debug for Fake {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Fake")
	}
}

impl Fake {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn with_library(self, path: impl Into<PathBuf>, symbols: &[(&'static str, FnPtr)]) -> Self {
		self.0.lock().unwrap().libraries.insert(path.into(), symbols.to_vec());
		self
	}

	pub(crate) fn failing_close(self) -> Self {
		self.0.lock().unwrap().failing_close = true;
		self
	}

	pub(crate) fn closed(&self) -> usize {
		self.0.lock().unwrap().closed
	}
}

unsafe impl Platform for Fake {
	unsafe fn open(&self, path: &Path) -> Result<Handle, LoadError> {
		let mut state = self.0.lock().unwrap();
		if !state.libraries.contains_key(path) {
			return Err(LoadError::new(path, "no such fake library"));
		}
		state.next_id += 1;
		let id = state.next_id;
		state.open.insert(id, path.to_owned());
		Ok(Handle::from_raw(id as *mut _).unwrap())
	}

	unsafe fn resolve(&self, handle: &Handle, symbol: &str) -> Option<FnPtr> {
		let state = self.0.lock().unwrap();
		let path = state.open.get(&(handle.as_raw() as usize))?;
		state.libraries[path]
			.iter()
			.find(|(name, _)| *name == symbol)
			.map(|(_, addr)| *addr)
	}

	unsafe fn close(&self, handle: Handle) -> io::Result<()> {
		let mut state = self.0.lock().unwrap();
		state.closed += 1;
		state.open.remove(&(handle.as_raw() as usize));
		if state.failing_close {
			Err(io::Error::new(io::ErrorKind::Other, "fake close failure"))
		} else {
			Ok(())
		}
	}

	fn translate_name(&self, name: &str) -> String {
		Posix::with_extension("so").file_name(name)
	}
}

extern "C" fn answer() -> c_int {
	42
}

extern "C" fn double(x: c_int) -> c_int {
	x * 2
}

extern "C" fn negate(x: c_int) -> c_int {
	-x
}

pub(crate) fn answer_ptr() -> FnPtr {
	unsafe { mem::transmute::<extern "C" fn() -> c_int, FnPtr>(answer) }
}

pub(crate) fn double_ptr() -> FnPtr {
	unsafe { mem::transmute::<extern "C" fn(c_int) -> c_int, FnPtr>(double) }
}

pub(crate) fn negate_ptr() -> FnPtr {
	unsafe { mem::transmute::<extern "C" fn(c_int) -> c_int, FnPtr>(negate) }
}
