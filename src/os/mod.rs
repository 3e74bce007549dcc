// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#[cfg(unix)]
pub(crate) mod unix;
#[cfg(windows)]
pub(crate) mod windows;

#[cfg(unix)]
pub(crate) use unix as imp;
#[cfg(windows)]
pub(crate) use windows as imp;

/// Raw library handle as handed out by the OS loader.
pub(crate) type RawHandle = *mut std::ffi::c_void;
