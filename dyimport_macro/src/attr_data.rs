// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use proc_macro2::Span;
use syn::punctuated::Punctuated;
use syn::{spanned::Spanned, *};

pub struct AttrData {
	/// Calling convention of every method, `"C"` unless overridden.
	pub abi: LitStr,
	/// Name of the generated struct, `<Trait>Proxy` unless overridden.
	pub proxy: Option<Ident>,
}

impl TryFrom<Punctuated<Expr, Token!(,)>> for AttrData {
	type Error = syn::Error;
	fn try_from(value: Punctuated<Expr, Token!(,)>) -> Result<Self> {
		let mut abi: Option<LitStr> = None;
		let mut proxy: Option<Ident> = None;
		let mut errors = vec![];
		const EXPECTED_KW: &str = "Expected `abi`, or `proxy`.";

		for expr in value.iter() {
			match expr {
				Expr::Assign(assign) => {
					let (assign_left, assign_right) = (assign.left.as_ref(), assign.right.as_ref());

					let Expr::Path(ExprPath { path, .. }) = assign_left else {
						errors.push(Error::new(assign_left.span(), EXPECTED_KW));
						continue;
					};
					if path.is_ident("abi") {
						// Branch for syntax: #[native_api(abi = <string>)]
						match assign_right {
							Expr::Lit(ExprLit {
								lit: Lit::Str(val), ..
							}) => {
								if abi.is_none() {
									abi = Some(val.clone());
								} else {
									errors.push(Error::new(assign.span(), "abi is already defined"));
								}
							}
							right => errors.push(Error::new(right.span(), "Expected string.")),
						}
					} else if path.is_ident("proxy") {
						// Branch for syntax: #[native_api(proxy = <ident>)]
						match assign_right {
							Expr::Path(ExprPath { path, .. }) if path.get_ident().is_some() => {
								if proxy.is_none() {
									proxy = path.get_ident().cloned();
								} else {
									errors.push(Error::new(assign.span(), "proxy is already defined"));
								}
							}
							right => errors.push(Error::new(right.span(), "Expected identifier.")),
						}
					} else {
						errors.push(Error::new(assign_left.span(), EXPECTED_KW));
					}
				}

				// Branch for everything else.
				expr => errors.push(Error::new(expr.span(), EXPECTED_KW)),
			}
		}

		// if there are any errors this will immediately combine and return early.
		if let Some(mut main_err) = errors.pop() {
			for err in errors {
				main_err.combine(err);
			}
			Err(main_err)
		} else {
			Ok(Self {
				abi: abi.unwrap_or_else(|| LitStr::new("C", Span::call_site())),
				proxy,
			})
		}
	}
}

/// Reads `#[link_name = "..."]`, if present.
pub fn link_name(attrs: &[Attribute]) -> Result<Option<LitStr>> {
	let mut found = None;
	for attr in attrs.iter().filter(|attr| attr.path().is_ident("link_name")) {
		let Meta::NameValue(MetaNameValue {
			value: Expr::Lit(ExprLit {
				lit: Lit::Str(val), ..
			}),
			..
		}) = &attr.meta
		else {
			return Err(Error::new(attr.span(), "Expected `#[link_name = \"<symbol>\"]`."));
		};
		if found.is_some() {
			return Err(Error::new(attr.span(), "link_name is already defined"));
		}
		found = Some(val.clone());
	}
	Ok(found)
}
