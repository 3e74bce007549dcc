// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![allow(clippy::missing_safety_doc)]

//! Run-time import of native shared libraries through Rust traits.
//!
//! Declare the native API as a trait, and let [`native_api`] generate a proxy
//! struct implementing it. [`import`] then searches for the library, loads it, and
//! binds every method to its exported symbol:
//!
//! ```no_run
//! use std::ffi::{c_char, c_ulong};
//!
//! #[dyimport::native_api]
//! pub trait Zlib {
//!     #[link_name = "zlibVersion"]
//!     fn version(&self) -> *const c_char;
//!     #[link_name = "compressBound"]
//!     fn compress_bound(&self, len: c_ulong) -> c_ulong;
//! }
//!
//! let zlib: ZlibProxy = dyimport::import("z", "1.3.1", false).unwrap();
//! let bound = zlib.compress_bound(1024);
//! # let _ = bound;
//! ```
//!
//! Symbols absent from the loaded build don't fail the import; calling such a
//! method panics with a [`MissingEntryPoint`] payload instead.

extern crate self as dyimport;

use std::ops::Deref;
use std::path::{Path, PathBuf};

pub mod error;
mod library;
mod os;
pub mod platform;
pub mod proxy;
pub mod search;
#[cfg(test)]
mod testing;

pub use dyimport_macro::native_api;
pub use error::{ImportError, LoadError, MissingEntryPoint};
pub use library::Library;
pub use platform::{system, FnPtr, Handle, Platform, System};
pub use proxy::{Binding, MethodDescriptor, NativeApi, Signature, Slot};
pub use search::{LibrarySpec, SearchOptions};

/// The result of an import.
pub type Result<T> = std::result::Result<T, ImportError>;

/// Searches for `name`, binds `T` to it, and returns the proxy.
///
/// `version` only shapes the file names tried (`name-1.2.3`, `name-1.2`, `name-1`, `name`).
/// With `suppress_unload` the library is never unloaded, even after the proxy is dropped.
///
/// # Errors
/// Returns [`ImportError::SearchExhausted`] listing every path tried if none could be opened.
pub fn import<T>(name: &str, version: &str, suppress_unload: bool) -> Result<T>
where
	T: NativeApi<Platform = System>,
{
	Importer::system()
		.suppress_unload(suppress_unload)
		.import(&LibrarySpec::new(name, version))
}

/// A configurable import request.
///
/// # Examples
/// ```no_run
/// # #[dyimport::native_api] pub trait Sqlite { fn sqlite3_libversion_number(&self) -> i32; }
/// use dyimport::{Importer, LibrarySpec, SearchOptions};
///
/// let sqlite: SqliteProxy = Importer::system()
///     .options(SearchOptions::from_env().asset_dir("/opt/sqlite"))
///     .suppress_unload(true)
///     .import(&LibrarySpec::new("sqlite3", "3.45"))
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Importer<P: Platform = System> {
	platform: P,
	options: SearchOptions,
	suppress_unload: bool,
}

impl Importer<System> {
	/// An importer using the running OS's loader.
	pub fn system() -> Self {
		Self::new(platform::system())
	}
}

impl<P: Platform + Clone> Importer<P> {
	/// Uses [`SearchOptions::from_env`] until [`options`](Importer::options) says otherwise.
	pub fn new(platform: P) -> Self {
		Self {
			platform,
			options: SearchOptions::from_env(),
			suppress_unload: false,
		}
	}

	pub fn options(mut self, options: SearchOptions) -> Self {
		self.options = options;
		self
	}

	pub fn suppress_unload(mut self, suppress: bool) -> Self {
		self.suppress_unload = suppress;
		self
	}

	#[inline]
	pub fn platform(&self) -> &P {
		&self.platform
	}

	#[inline]
	pub fn search_options(&self) -> &SearchOptions {
		&self.options
	}

	/// The paths an import of `spec` would try, in order. Nothing is loaded.
	pub fn candidates(&self, spec: &LibrarySpec) -> Vec<PathBuf> {
		search::candidates(&self.platform, spec, &self.options)
	}

	/// Finds and opens the library without binding anything.
	pub fn open(&self, spec: &LibrarySpec) -> Result<search::Found<P>> {
		search::search(&self.platform, spec, &self.options, !self.suppress_unload)
	}

	pub fn import<T: NativeApi<Platform = P>>(&self, spec: &LibrarySpec) -> Result<T> {
		self.import_with_report(spec).map(Imported::into_inner)
	}

	/// Like [`import`](Importer::import), also reporting where the library was
	/// found and which paths failed first.
	pub fn import_with_report<T: NativeApi<Platform = P>>(&self, spec: &LibrarySpec) -> Result<Imported<T>> {
		let found = self.open(spec)?;
		let binding = Binding::bind(found.library, T::descriptors());
		let missing = binding.missing().count();
		if missing > 0 {
			tracing::warn!(library = spec.name(), missing, "native library lacks some entry points");
		}
		Ok(Imported {
			// SAFETY: bound from `T::descriptors()` just above.
			api: unsafe { T::from_binding(binding) },
			path: found.path,
			failures: found.failures,
		})
	}
}

/// A bound proxy together with its search report.
#[derive(Debug)]
pub struct Imported<T> {
	api: T,
	path: PathBuf,
	failures: Vec<LoadError>,
}

impl<T> Imported<T> {
	/// The path the library was loaded from.
	#[inline]
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Paths that failed before [`path`](Imported::path), in order.
	#[inline]
	pub fn failures(&self) -> &[LoadError] {
		&self.failures
	}

	#[inline]
	pub fn into_inner(self) -> T {
		self.api
	}
}

impl<T> Deref for Imported<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		&self.api
	}
}
