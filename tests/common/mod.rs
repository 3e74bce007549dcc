// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

// A scripted loader: libraries exist only where a test put them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_int;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dyimport::platform::Posix;
use dyimport::{FnPtr, Handle, LoadError, Platform};

#[derive(Default)]
struct State {
	libraries: HashMap<PathBuf, Vec<(&'static str, FnPtr)>>,
	// reasons given for paths that exist but can't be loaded
	rejected: HashMap<PathBuf, String>,
	attempted: Vec<PathBuf>,
	open: HashMap<usize, PathBuf>,
	next_id: usize,
	closed: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedLoader(Arc<Mutex<State>>);

impl std::fmt::Debug for ScriptedLoader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("ScriptedLoader").finish()
	}
}

impl ScriptedLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn library(self, path: impl Into<PathBuf>, symbols: &[(&'static str, FnPtr)]) -> Self {
		self.0.lock().unwrap().libraries.insert(path.into(), symbols.to_vec());
		self
	}

	pub fn reject(self, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
		self.0.lock().unwrap().rejected.insert(path.into(), reason.into());
		self
	}

	pub fn attempted(&self) -> Vec<PathBuf> {
		self.0.lock().unwrap().attempted.clone()
	}

	pub fn closed(&self) -> usize {
		self.0.lock().unwrap().closed
	}

	pub fn open_count(&self) -> usize {
		self.0.lock().unwrap().open.len()
	}
}

unsafe impl Platform for ScriptedLoader {
	unsafe fn open(&self, path: &Path) -> Result<Handle, LoadError> {
		let mut state = self.0.lock().unwrap();
		state.attempted.push(path.to_owned());
		if let Some(reason) = state.rejected.get(path) {
			return Err(LoadError::new(path, reason.as_str()));
		}
		if !state.libraries.contains_key(path) {
			return Err(LoadError::new(path, "cannot open shared object file: No such file or directory"));
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
		Ok(())
	}

	fn translate_name(&self, name: &str) -> String {
		Posix::with_extension("so").file_name(name)
	}
}

pub extern "C" fn add(a: c_int, b: c_int) -> c_int {
	a + b
}

pub extern "C" fn sub(a: c_int, b: c_int) -> c_int {
	a - b
}

pub extern "C" fn mul(a: c_int, b: c_int) -> c_int {
	a * b
}

pub extern "C" fn zero() -> c_int {
	0
}

pub fn binary(f: extern "C" fn(c_int, c_int) -> c_int) -> FnPtr {
	unsafe { std::mem::transmute::<extern "C" fn(c_int, c_int) -> c_int, FnPtr>(f) }
}

pub fn nullary(f: extern "C" fn() -> c_int) -> FnPtr {
	unsafe { std::mem::transmute::<extern "C" fn() -> c_int, FnPtr>(f) }
}
