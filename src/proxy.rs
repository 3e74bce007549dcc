// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! Dispatch tables behind generated proxies.
//!
//! A proxy is a struct holding a [`Binding`]: one [`Slot`] per declared method,
//! each either bound to the resolved native address or marked missing. Calls go
//! through [`Binding::target`], which faults with [`MissingEntryPoint`] only for
//! the missing ones, so a library lacking a few symbols still binds.
//!
//! Proxies are normally produced by [`native_api`](crate::native_api), but
//! delegating by hand works the same way:
//!
//! ```
//! use dyimport::{Binding, MethodDescriptor, NativeApi, Platform, Signature, FnPtr};
//! use std::ffi::c_int;
//!
//! pub struct Zlib<P: Platform>(Binding<P>);
//!
//! impl<P: Platform> Zlib<P> {
//!     pub fn version(&self) -> c_int {
//!         type Adapter = unsafe extern "C" fn() -> c_int;
//!         let target = self.0.target(0);
//!         unsafe { std::mem::transmute::<FnPtr, Adapter>(target)() }
//!     }
//! }
//!
//! impl<P: Platform> NativeApi for Zlib<P> {
//!     type Platform = P;
//!     fn descriptors() -> Vec<MethodDescriptor> {
//!         vec![MethodDescriptor::new("version", "zlibVersion", Signature::of::<c_int>(vec![]))]
//!     }
//!     unsafe fn from_binding(binding: Binding<P>) -> Self { Self(binding) }
//!     fn binding(&self) -> &Binding<P> { &self.0 }
//!     fn into_binding(self) -> Binding<P> { self.0 }
//! }
//! ```

use std::any;
use std::collections::BTreeMap;
use std::{fmt, io};

use crate::error::MissingEntryPoint;
use crate::library::Library;
use crate::platform::{FnPtr, Platform};

/// The shape of a native function: return type and ordered parameter types.
///
/// Type names come from [`std::any::type_name`], so aliases like `c_int` and `i32`
/// produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
	ret: &'static str,
	params: Vec<&'static str>,
}

impl Signature {
	#[inline]
	pub fn new(ret: &'static str, params: Vec<&'static str>) -> Self {
		Self { ret, params }
	}

	/// Signature returning `R`; `params` are usually built with [`type_name`](any::type_name).
	#[inline]
	pub fn of<R: ?Sized>(params: Vec<&'static str>) -> Self {
		Self::new(any::type_name::<R>(), params)
	}

	#[inline]
	pub fn ret(&self) -> &'static str {
		self.ret
	}

	#[inline]
	pub fn params(&self) -> &[&'static str] {
		&self.params
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "fn({}) -> {}", self.params.join(", "), self.ret)
	}
}

/// One declared method of a native interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
	pub name: &'static str,
	/// Exported symbol the method binds to, usually equal to `name`.
	pub link_name: &'static str,
	pub signature: Signature,
}

impl MethodDescriptor {
	#[inline]
	pub fn new(name: &'static str, link_name: &'static str, signature: Signature) -> Self {
		Self {
			name,
			link_name,
			signature,
		}
	}
}

/// The binding state of one method.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
	Bound(FnPtr),
	Missing,
}

impl Slot {
	#[inline]
	pub fn is_bound(&self) -> bool {
		matches!(self, Self::Bound(_))
	}
}

/// Resolved entry points of one interface over an owned [`Library`].
///
/// Dropping the binding drops the library, which unloads it unless unloading was suppressed.
pub struct Binding<P: Platform> {
	library: Library<P>,
	methods: Vec<MethodDescriptor>,
	slots: Box<[Slot]>,
}

impl<P: Platform> Binding<P> {
	/// Resolves every method in `library`. Absent symbols become [`Slot::Missing`];
	/// binding itself never fails.
	pub fn bind(library: Library<P>, methods: Vec<MethodDescriptor>) -> Self {
		let slots = methods
			.iter()
			.map(|method| match library.symbol(method.link_name) {
				Some(addr) => Slot::Bound(addr),
				None => {
					tracing::debug!(method = method.name, symbol = method.link_name, "entry point not found");
					Slot::Missing
				}
			})
			.collect();
		Self {
			library,
			methods,
			slots,
		}
	}

	#[inline]
	pub fn library(&self) -> &Library<P> {
		&self.library
	}

	#[inline]
	pub fn methods(&self) -> &[MethodDescriptor] {
		&self.methods
	}

	/// # Panics
	/// Panics if `index` is out of bounds.
	#[inline]
	pub fn slot(&self, index: usize) -> Slot {
		self.slots[index]
	}

	fn index_of(&self, name: &str) -> Option<usize> {
		self.methods.iter().position(|m| m.name == name)
	}

	/// The slot of the method called `name`, or `None` if no such method is declared.
	pub fn entry(&self, name: &str) -> Option<Slot> {
		self.index_of(name).map(|i| self.slots[i])
	}

	#[inline]
	pub fn is_bound(&self, name: &str) -> bool {
		self.entry(name).is_some_and(|slot| slot.is_bound())
	}

	/// Names of declared methods the library doesn't export.
	pub fn missing(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.methods
			.iter()
			.zip(self.slots.iter())
			.filter(|(_, slot)| !slot.is_bound())
			.map(|(m, _)| m.name)
	}

	/// Address to call for method `index`.
	pub fn try_target(&self, index: usize) -> Result<FnPtr, MissingEntryPoint> {
		match self.slots[index] {
			Slot::Bound(addr) => Ok(addr),
			Slot::Missing => Err(MissingEntryPoint {
				name: self.methods[index].name,
			}),
		}
	}

	/// Address to call for method `index`.
	///
	/// # Panics
	/// Panics with a [`MissingEntryPoint`] payload if the method isn't bound.
	#[track_caller]
	pub fn target(&self, index: usize) -> FnPtr {
		match self.try_target(index) {
			Ok(addr) => addr,
			Err(e) => {
				tracing::error!(method = e.name, "called unbound native method");
				std::panic::panic_any(e)
			}
		}
	}

	/// Replaces the slot of method `name`, returning the previous one.
	/// Every other slot is left as is.
	///
	/// Returns `None` if no such method is declared.
	///
	/// # Safety
	/// A bound address must point to a function of the method's signature that
	/// stays valid as long as this binding.
	pub unsafe fn rebind(&mut self, name: &str, slot: Slot) -> Option<Slot> {
		let index = self.index_of(name)?;
		Some(std::mem::replace(&mut self.slots[index], slot))
	}

	/// Methods grouped by signature. Each group shares one adapter shape while
	/// keeping its own bound address.
	///
	/// Groups are keyed by resolved type names, so `c_int` and `i32` land in the
	/// same group even where a generated proxy spells them as separate adapter aliases.
	pub fn signature_groups(&self) -> BTreeMap<&Signature, Vec<&'static str>> {
		let mut groups: BTreeMap<&Signature, Vec<&'static str>> = BTreeMap::new();
		for method in &self.methods {
			groups.entry(&method.signature).or_default().push(method.name);
		}
		groups
	}

	/// Number of distinct adapter shapes.
	#[inline]
	pub fn adapter_shapes(&self) -> usize {
		self.signature_groups().len()
	}

	#[inline]
	pub fn into_library(self) -> Library<P> {
		self.library
	}

	/// Releases the library now. See [`Library::close`].
	#[inline]
	pub fn close(self) -> io::Result<()> {
		self.library.close()
	}
}

impl<P: Platform + fmt::Debug> fmt::Debug for Binding<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let slots: BTreeMap<&str, bool> = self
			.methods
			.iter()
			.zip(self.slots.iter())
			.map(|(m, s)| (m.name, s.is_bound()))
			.collect();
		f.debug_struct("Binding")
			.field("library", &self.library)
			.field("bound", &slots)
			.finish()
	}
}

/// A caller-facing interface backed by a [`Binding`].
///
/// Implemented by proxies generated with [`native_api`](crate::native_api).
pub trait NativeApi: Sized {
	type Platform: Platform;

	/// The methods to bind, in slot order.
	fn descriptors() -> Vec<MethodDescriptor>;
	/// Wraps `binding` without checking it.
	///
	/// # Safety
	/// `binding` must have been bound from [`descriptors`](NativeApi::descriptors):
	/// same methods, same order. Calls index slots by position and cast them to
	/// the declared signature.
	unsafe fn from_binding(binding: Binding<Self::Platform>) -> Self;
	fn binding(&self) -> &Binding<Self::Platform>;
	fn into_binding(self) -> Binding<Self::Platform>;

	/// Wraps `binding` if it was bound for this interface, handing it back otherwise.
	fn try_from_binding(binding: Binding<Self::Platform>) -> Result<Self, Binding<Self::Platform>> {
		if binding.methods() == Self::descriptors().as_slice() {
			// SAFETY: the descriptors match slot for slot.
			Ok(unsafe { Self::from_binding(binding) })
		} else {
			Err(binding)
		}
	}
}
