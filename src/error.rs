// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use std::fmt::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The OS loader rejected one candidate path.
///
/// `message` carries the native diagnostic (`dlerror` text, or the Win32 error
/// and its code), which is what tells "wrong architecture" apart from "not installed".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .path.display())]
pub struct LoadError {
	pub path: PathBuf,
	pub message: String,
}

impl LoadError {
	#[inline]
	pub fn new(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
		Self {
			path: path.as_ref().to_owned(),
			message: message.into(),
		}
	}
}

/// Terminal failures of an import.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
	/// No candidate path could be opened. Every attempt is kept, in order.
	#[error("{}", exhausted_message(.library, .attempts))]
	SearchExhausted {
		library: String,
		attempts: Vec<LoadError>,
	},
	#[error("invalid library name `{name}`: {reason}")]
	InvalidName { name: String, reason: &'static str },
}

impl ImportError {
	/// Every failed load attempt, in search order.
	pub fn attempts(&self) -> &[LoadError] {
		match self {
			Self::SearchExhausted { attempts, .. } => attempts,
			Self::InvalidName { .. } => &[],
		}
	}
}

fn exhausted_message(library: &str, attempts: &[LoadError]) -> String {
	let mut msg = format!("library `{library}` not found ({} paths tried)", attempts.len());
	for attempt in attempts {
		let _ = write!(msg, "\n  {attempt}");
	}
	msg
}

/// A method was called whose native symbol is absent from the loaded library.
///
/// Proxies raise this with [`std::panic::panic_any`], so it can be recovered from
/// the payload of [`std::panic::catch_unwind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("entry point `{name}` not found in native library")]
pub struct MissingEntryPoint {
	pub name: &'static str,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_exhausted_lists_every_attempt() {
		let err = ImportError::SearchExhausted {
			library: "zstd".to_owned(),
			attempts: vec![
				LoadError::new("/opt/a/libzstd.so", "wrong ELF class: ELFCLASS32"),
				LoadError::new("libzstd.so", "cannot open shared object file"),
			],
		};
		let msg = err.to_string();
		assert!(msg.starts_with("library `zstd` not found (2 paths tried)"));
		assert!(msg.contains("/opt/a/libzstd.so: wrong ELF class: ELFCLASS32"));
		assert!(msg.contains("libzstd.so: cannot open shared object file"));
		assert_eq!(err.attempts().len(), 2);
	}

	#[test]
	fn test_missing_entry_point_display() {
		let err = MissingEntryPoint { name: "ZSTD_compress" };
		assert_eq!(
			err.to_string(),
			"entry point `ZSTD_compress` not found in native library"
		);
	}
}
