// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![cfg(target_os = "linux")]

use std::path::{Path, PathBuf};
use std::{fs, io, panic};

use dyimport::*;

// glibc ships versioned sonames (`libm.so.6`) and no `libm-6.so`.
#[derive(Debug, Clone, Copy)]
struct Soname(System);

unsafe impl Platform for Soname {
	unsafe fn open(&self, path: &Path) -> std::result::Result<Handle, LoadError> {
		self.0.open(path)
	}

	unsafe fn resolve(&self, handle: &Handle, symbol: &str) -> Option<FnPtr> {
		self.0.resolve(handle, symbol)
	}

	unsafe fn close(&self, handle: Handle) -> io::Result<()> {
		self.0.close(handle)
	}

	fn translate_name(&self, name: &str) -> String {
		match name.rsplit_once('-') {
			Some((base, version)) => format!("lib{base}.so.{version}"),
			None => self.0.translate_name(name),
		}
	}
}

#[native_api(proxy = LibM)]
trait Math {
	fn cos(&self, x: f64) -> f64;
	fn floor(&self, x: f64) -> f64;
	fn sqrt(&self, x: f64) -> f64;
	fn dyimport_no_such_function(&self, x: f64) -> f64;
}

fn libm() -> Imported<LibM<Soname>> {
	Importer::new(Soname(system()))
		.options(SearchOptions::new().executable_dir(false))
		.import_with_report(&LibrarySpec::new("m", "6"))
		.unwrap()
}

#[test]
fn test_libm_from_system_path() {
	let m = libm();
	assert_eq!(m.path(), Path::new("libm.so.6"));
	assert!(m.failures().is_empty());
	assert_eq!(m.cos(0.0), 1.0);
	assert_eq!(m.floor(2.5), 2.0);
	assert_eq!(m.sqrt(16.0), 4.0);
	assert_eq!(m.binding().adapter_shapes(), 1);
}

#[test]
fn test_libm_missing_symbol() {
	let m = libm();
	assert_eq!(
		m.binding().missing().collect::<Vec<_>>(),
		["dyimport_no_such_function"]
	);
	let payload = panic::catch_unwind(panic::AssertUnwindSafe(|| m.dyimport_no_such_function(1.0))).unwrap_err();
	assert_eq!(
		payload.downcast_ref::<MissingEntryPoint>(),
		Some(&MissingEntryPoint {
			name: "dyimport_no_such_function"
		})
	);
}

#[test]
fn test_suppressed_libm_outlives_proxy() {
	let m = Importer::new(Soname(system()))
		.options(SearchOptions::new().executable_dir(false))
		.suppress_unload(true)
		.import::<LibM<Soname>>(&LibrarySpec::new("m", "6"))
		.unwrap();
	assert!(!m.binding().library().unloads());
	m.into_binding().close().unwrap();
}

#[test]
fn test_loader_diagnostics_are_kept() {
	let dir = tempfile::tempdir().unwrap();
	let bogus: PathBuf = dir.path().join("libbogus.so");
	fs::write(&bogus, b"definitely not an ELF image").unwrap();

	let err = Importer::system()
		.options(
			SearchOptions::new()
				.executable_dir(false)
				.system_path(false)
				.asset_dir(dir.path()),
		)
		.open(&LibrarySpec::new("bogus", ""))
		.unwrap_err();

	let attempts = err.attempts();
	assert_eq!(attempts.len(), 3);
	let rejected = attempts.iter().find(|e| e.path == bogus).unwrap();
	// dlerror text names the file it refused
	assert!(rejected.message.contains("libbogus.so"), "{}", rejected.message);
	assert!(err.to_string().contains(&rejected.message));
}
