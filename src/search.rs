// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! Candidate paths for a library and the sequential search over them.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ImportError, LoadError};
use crate::library::Library;
use crate::platform::Platform;

/// Environment variable holding extra native asset roots, separated like `PATH`.
pub const NATIVE_PATH_VAR: &str = "DYIMPORT_NATIVE_PATH";

/// A logical library name plus the dot-separated version used for file name fallbacks.
///
/// The version is never checked for compatibility, it only shapes the names tried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibrarySpec {
	name: String,
	version: String,
}

impl LibrarySpec {
	/// # Examples
	/// ```
	/// # use dyimport::LibrarySpec;
	/// let spec = LibrarySpec::new("zstd", "1.5.2");
	/// assert_eq!(spec.name_variants(), ["zstd-1.5.2", "zstd-1.5", "zstd-1", "zstd"]);
	/// ```
	pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
		}
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn version(&self) -> &str {
		&self.version
	}

	/// Logical names to try, most specific first, dropping one trailing version
	/// component at a time and ending with the bare name.
	pub fn name_variants(&self) -> Vec<String> {
		let parts: Vec<&str> = self.version.split('.').filter(|p| !p.is_empty()).collect();
		let mut variants: Vec<String> = (1..=parts.len())
			.rev()
			.map(|n| format!("{}-{}", self.name, parts[..n].join(".")))
			.collect();
		variants.push(self.name.clone());
		variants
	}

	fn validate(&self) -> Result<(), ImportError> {
		let reason = if self.name.is_empty() {
			"name is empty"
		} else if self.name.contains(['/', '\\']) {
			"name contains a path separator"
		} else if self.name.contains('\0') {
			"name contains a NUL byte"
		} else {
			return Ok(());
		};
		Err(ImportError::InvalidName {
			name: self.name.clone(),
			reason,
		})
	}
}

/// Where to look for a library.
///
/// Each asset root (the executable's directory first, then every configured
/// companion directory) contributes `root/runtimes/<rid>/native`, `root/<arch>`
/// and `root`. The OS default search path comes last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
	asset_dirs: Vec<PathBuf>,
	runtime_id: String,
	executable_dir: bool,
	system_path: bool,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self::new()
	}
}

impl SearchOptions {
	/// Searches next to the executable and then the OS default path.
	pub fn new() -> Self {
		Self {
			asset_dirs: Vec::new(),
			runtime_id: runtime_id(),
			executable_dir: true,
			system_path: true,
		}
	}

	/// Like [`new`](SearchOptions::new), plus every root listed in [`NATIVE_PATH_VAR`].
	pub fn from_env() -> Self {
		let mut options = Self::new();
		if let Some(paths) = env::var_os(NATIVE_PATH_VAR) {
			options
				.asset_dirs
				.extend(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
		}
		options
	}

	/// Adds a companion asset root, searched after the ones already added.
	pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.asset_dirs.push(dir.into());
		self
	}

	/// Overrides the runtime identifier, e.g. `linux-musl-x64`.
	pub fn runtime_id(mut self, rid: impl Into<String>) -> Self {
		self.runtime_id = rid.into();
		self
	}

	/// Whether the running executable's directory is an asset root.
	pub fn executable_dir(mut self, enabled: bool) -> Self {
		self.executable_dir = enabled;
		self
	}

	/// Whether bare file names are finally left to the OS default search path.
	pub fn system_path(mut self, enabled: bool) -> Self {
		self.system_path = enabled;
		self
	}

	#[inline]
	pub fn asset_dirs(&self) -> &[PathBuf] {
		&self.asset_dirs
	}

	#[inline]
	pub fn rid(&self) -> &str {
		&self.runtime_id
	}

	/// The architecture part of the runtime identifier.
	pub fn arch(&self) -> &str {
		self.runtime_id.rsplit('-').next().unwrap_or(&self.runtime_id)
	}

	/// Ordered, deduplicated directories to search.
	pub fn base_dirs(&self) -> Vec<PathBuf> {
		let exe_dir = self
			.executable_dir
			.then(|| env::current_exe().ok())
			.flatten()
			.and_then(|exe| exe.parent().map(Path::to_owned));

		let mut dirs: Vec<PathBuf> = Vec::new();
		for root in exe_dir.iter().chain(&self.asset_dirs) {
			let qualified = [
				root.join("runtimes").join(&self.runtime_id).join("native"),
				root.join(self.arch()),
				root.clone(),
			];
			for dir in qualified {
				if !dirs.contains(&dir) {
					dirs.push(dir);
				}
			}
		}
		dirs
	}
}

/// Runtime identifier of this build, e.g. `linux-x64`, `osx-arm64` or `win-x86`.
pub fn runtime_id() -> String {
	let os = match env::consts::OS {
		"windows" => "win",
		"macos" => "osx",
		other => other,
	};
	let arch = match env::consts::ARCH {
		"x86_64" => "x64",
		"aarch64" => "arm64",
		other => other,
	};
	format!("{os}-{arch}")
}

/// Every path to attempt, directory-major: all name variants in one directory
/// before moving on to the next.
pub fn candidates<P: Platform>(platform: &P, spec: &LibrarySpec, options: &SearchOptions) -> Vec<PathBuf> {
	let files: Vec<String> = spec
		.name_variants()
		.iter()
		.map(|name| platform.translate_name(name))
		.collect();

	let mut paths: Vec<PathBuf> = options
		.base_dirs()
		.iter()
		.flat_map(|dir| files.iter().map(move |file| dir.join(file)))
		.collect();
	if options.system_path {
		paths.extend(files.into_iter().map(PathBuf::from));
	}
	paths
}

/// A successful search.
#[derive(Debug)]
pub struct Found<P: Platform> {
	pub library: Library<P>,
	/// The path that opened.
	pub path: PathBuf,
	/// Every path that failed before it, in order.
	pub failures: Vec<LoadError>,
}

/// Opens the first candidate the platform accepts.
///
/// Failures are accumulated, not fatal; only running out of candidates is.
pub fn search<P: Platform + Clone>(
	platform: &P,
	spec: &LibrarySpec,
	options: &SearchOptions,
	unload: bool,
) -> Result<Found<P>, ImportError> {
	spec.validate()?;
	let mut failures = Vec::new();
	for path in candidates(platform, spec, options) {
		tracing::debug!(library = spec.name(), path = %path.display(), "trying candidate");
		match unsafe { platform.open(&path) } {
			Ok(handle) => {
				tracing::info!(
					library = spec.name(),
					path = %path.display(),
					failed = failures.len(),
					"loaded native library"
				);
				// SAFETY: `handle` was just opened by `platform` and nothing else holds it.
				let library = unsafe { Library::from_raw_parts(platform.clone(), handle, unload) };
				return Ok(Found {
					library,
					path,
					failures,
				});
			}
			Err(e) => {
				tracing::debug!(error = %e.message, "candidate rejected");
				failures.push(e);
			}
		}
	}
	Err(ImportError::SearchExhausted {
		library: spec.name().to_owned(),
		attempts: failures,
	})
}
