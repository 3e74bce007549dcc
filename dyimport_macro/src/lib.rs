// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use quote::*;

use proc_macro::TokenStream as TokenStream1;
use proc_macro2::TokenStream as TokenStream2;
use std::collections::HashMap;
use syn::{
    ext::IdentExt, parse::Parser, parse_quote, punctuated::Punctuated, Expr, FnArg, Ident,
    ItemTrait, LitStr, ReturnType, Signature, Token, TraitItem, Type,
};

mod attr_data;
mod diagnostic;
use attr_data::*;

/// Generates a proxy struct implementing the annotated trait by calling into a
/// native library.
///
/// Every required `&self` method is bound to the exported symbol of the same name,
/// or to the one named by `#[link_name = "..."]`. Methods with a body are kept
/// as-is and may call the bound ones.
///
/// Arguments:
/// - `abi = "system"`: calling convention of the native functions, `"C"` by default.
/// - `proxy = Name`: name of the generated struct, `<Trait>Proxy` by default.
#[proc_macro_attribute]
pub fn native_api(args: TokenStream1, input: TokenStream1) -> TokenStream1 {
    let args = TokenStream2::from(args);
    let input = TokenStream2::from(input);
    let item = match syn::parse2::<ItemTrait>(input) {
        Ok(item) => item,
        Err(e) => return e.into_compile_error().into(),
    };

    let punct = match Parser::parse2(Punctuated::<Expr, Token!(,)>::parse_terminated, args) {
        Ok(punct) => punct,
        Err(e) => return e.into_compile_error().into(),
    };
    let attr = match AttrData::try_from(punct) {
        Ok(attr) => attr,
        Err(e) => return e.into_compile_error().into(),
    };
    match expand(attr, item) {
        Ok(ret) => TokenStream1::from(ret),
        Err(e) => e.into_compile_error().into(),
    }
}

struct Method {
    sig: Signature,
    link_name: String,
}

fn expand(attr: AttrData, mut item: ItemTrait) -> syn::Result<TokenStream2> {
    let mut errors = Vec::new();
    diagnostic::trait_diag(&item, &mut errors);

    let mut methods = Vec::new();
    for trait_item in item.items.iter_mut() {
        let TraitItem::Fn(fn_item) = trait_item else {
            continue;
        };
        if fn_item.default.is_some() {
            continue;
        }
        let link_name = match attr_data::link_name(&fn_item.attrs) {
            Ok(Some(lit)) => lit.value(),
            Ok(None) => fn_item.sig.ident.unraw().to_string(),
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        // `link_name` only means something on foreign items.
        fn_item.attrs.retain(|attr| !attr.path().is_ident("link_name"));
        methods.push(Method {
            sig: fn_item.sig.clone(),
            link_name,
        });
    }

    if let Some(mut main_err) = errors.pop() {
        for err in errors {
            main_err.combine(err);
        }
        return Err(main_err);
    }

    let trait_ident = &item.ident;
    let vis = &item.vis;
    let proxy = attr
        .proxy
        .clone()
        .unwrap_or_else(|| format_ident!("{}Proxy", trait_ident));
    let doc = format!("Proxy implementing [`{trait_ident}`] over a loaded native library.");

    // one adapter type per distinct spelling of a signature. Aliases such as
    // `c_int` and `i32` can't be resolved here, `Binding::signature_groups`
    // is the canonical grouping.
    let mut shapes: HashMap<String, Ident> = HashMap::new();
    let mut adapters = Vec::new();
    let mut descriptors = Vec::new();
    let mut impls = Vec::new();
    for (index, method) in methods.iter().enumerate() {
        let sig = &method.sig;
        let (param_list, param_ty_list): (Vec<Ident>, Vec<Type>) = sig
            .inputs
            .iter()
            .skip(1)
            .enumerate()
            .filter_map(|(i, arg)| match arg {
                FnArg::Typed(pat_type) => Some((format_ident!("p{i}"), (*pat_type.ty).clone())),
                FnArg::Receiver(_) => None,
            })
            .unzip();
        let output = &sig.output;
        let ret_ty: Type = match output {
            ReturnType::Default => parse_quote!(()),
            ReturnType::Type(_, ty) => (**ty).clone(),
        };

        let key = quote!(fn(#(#param_ty_list),*) -> #ret_ty).to_string();
        let adapter = match shapes.get(&key) {
            Some(adapter) => adapter.clone(),
            None => {
                let adapter = format_ident!("__{}Adapter{}", proxy, shapes.len());
                let abi = &attr.abi;
                adapters.push(quote! {
                    #[doc(hidden)]
                    #[allow(non_camel_case_types)]
                    type #adapter = unsafe extern #abi fn(#(#param_ty_list),*) #output;
                });
                shapes.insert(key, adapter.clone());
                adapter
            }
        };

        let fn_name = &sig.ident;
        let name_str = LitStr::new(&fn_name.unraw().to_string(), fn_name.span());
        let link_name = LitStr::new(&method.link_name, fn_name.span());
        descriptors.push(quote! {
            ::dyimport::MethodDescriptor::new(
                #name_str,
                #link_name,
                ::dyimport::Signature::new(
                    ::core::any::type_name::<#ret_ty>(),
                    ::std::vec![#(::core::any::type_name::<#param_ty_list>()),*],
                ),
            )
        });

        let unsafety = &sig.unsafety;
        impls.push(quote! {
            #[inline]
            #[allow(unused_unsafe)]
            #unsafety fn #fn_name(&self, #(#param_list: #param_ty_list),*) #output {
                let target = ::dyimport::Binding::target(&self.binding, #index);
                // the slot was resolved for exactly this signature
                unsafe { ::core::mem::transmute::<::dyimport::FnPtr, #adapter>(target)(#(#param_list),*) }
            }
        });
    }

    Ok(quote! {
        #item

        #(#adapters)*

        #[doc = #doc]
        #[derive(Debug)]
        #vis struct #proxy<P: ::dyimport::Platform = ::dyimport::System> {
            binding: ::dyimport::Binding<P>,
        }

        impl<P: ::dyimport::Platform> ::dyimport::NativeApi for #proxy<P> {
            type Platform = P;

            fn descriptors() -> ::std::vec::Vec<::dyimport::MethodDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            unsafe fn from_binding(binding: ::dyimport::Binding<P>) -> Self {
                Self { binding }
            }

            fn binding(&self) -> &::dyimport::Binding<P> {
                &self.binding
            }

            fn into_binding(self) -> ::dyimport::Binding<P> {
                self.binding
            }
        }

        impl<P: ::dyimport::Platform> #trait_ident for #proxy<P> {
            #(#impls)*
        }
    })
}
