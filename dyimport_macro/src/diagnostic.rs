// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

// Rejects trait shapes a proxy can't implement.
use syn::spanned::Spanned;
use syn::{
    Error, FnArg, GenericArgument, ItemTrait, PathArguments, ReturnType, TraitItem, TraitItemFn, Type,
    TypeReference,
};

pub(crate) fn trait_diag(item: &ItemTrait, errors: &mut Vec<Error>) {
    if !item.generics.params.is_empty() || item.generics.where_clause.is_some() {
        errors.push(Error::new(item.generics.span(), "generic interfaces are unsupported"));
    }
    if !item.supertraits.is_empty() {
        errors.push(Error::new(item.supertraits.span(), "supertraits are unsupported"));
    }
    if let Some(unsafety) = item.unsafety {
        errors.push(Error::new(unsafety.span(), "`unsafe trait` is unsupported"));
    }
    for trait_item in item.items.iter() {
        match trait_item {
            TraitItem::Fn(fn_item) if fn_item.default.is_none() => method_diag(fn_item, errors),
            TraitItem::Fn(_) => (),
            TraitItem::Const(c) if c.default.is_none() => {
                errors.push(Error::new(c.span(), "associated constants need a default"))
            }
            TraitItem::Type(t) if t.default.is_none() => {
                errors.push(Error::new(t.span(), "associated types are unsupported"))
            }
            TraitItem::Macro(m) => errors.push(Error::new(m.span(), "macros in interfaces are unsupported")),
            _ => (),
        }
    }
}

// only required methods get here, provided ones are left alone.
fn method_diag(fn_item: &TraitItemFn, errors: &mut Vec<Error>) {
    let sig = &fn_item.sig;
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        errors.push(Error::new(sig.generics.span(), "generic methods can't be bound to a symbol"));
    }
    if let Some(asyncness) = sig.asyncness {
        errors.push(Error::new(asyncness.span(), "`async` methods are unsupported"));
    }
    if let Some(variadic) = &sig.variadic {
        errors.push(Error::new(variadic.span(), "variadic methods are unsupported"));
    }
    if let Some(abi) = &sig.abi {
        errors.push(Error::new(abi.span(), "set the ABI with `#[native_api(abi = \"...\")]`"));
    }
    match sig.inputs.first() {
        Some(FnArg::Receiver(rec)) if rec.reference.is_some() && rec.mutability.is_none() => (),
        Some(FnArg::Receiver(rec)) => {
            errors.push(Error::new(rec.span(), "only `&self` receivers are supported"))
        }
        _ => errors.push(Error::new(sig.span(), "bound methods must take `&self`")),
    }
    for arg in sig.inputs.iter().skip(1) {
        if let FnArg::Typed(pat_type) = arg {
            impl_trait_diag(&pat_type.ty, errors);
        }
    }
    if let ReturnType::Type(_, ty) = &sig.output {
        impl_trait_diag(ty, errors);
        if let Some(reference) = elided_reference(ty) {
            errors.push(Error::new(
                reference.span(),
                "returned references need `'static`, native memory has no Rust lifetime",
            ));
        }
    }
}

// first reference without an explicit `'static` lifetime, looking through nesting.
fn elided_reference(ty: &Type) -> Option<&TypeReference> {
    match ty {
        Type::Reference(reference) => match &reference.lifetime {
            Some(lifetime) if lifetime.ident == "static" => elided_reference(&reference.elem),
            _ => Some(reference),
        },
        Type::Ptr(ptr) => elided_reference(&ptr.elem),
        Type::Paren(paren) => elided_reference(&paren.elem),
        Type::Group(group) => elided_reference(&group.elem),
        Type::Array(array) => elided_reference(&array.elem),
        Type::Slice(slice) => elided_reference(&slice.elem),
        Type::Tuple(tuple) => tuple.elems.iter().find_map(elided_reference),
        Type::Path(path) => path.path.segments.iter().find_map(|segment| match &segment.arguments {
            PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
                GenericArgument::Type(ty) => elided_reference(ty),
                _ => None,
            }),
            _ => None,
        }),
        _ => None,
    }
}

fn impl_trait_diag(ty: &Type, errors: &mut Vec<Error>) {
    if let Type::ImplTrait(_) = ty {
        errors.push(Error::new(ty.span(), "`impl Trait` has no native representation"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn errors(item: ItemTrait) -> Vec<String> {
        let mut errors = Vec::new();
        trait_diag(&item, &mut errors);
        errors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_plain_interface_passes() {
        let item: ItemTrait = parse_quote! {
            trait Zlib {
                fn version(&self) -> *const c_char;
                fn name(&self) -> &'static CStr;
                fn crc32(&self, crc: c_ulong, buf: &[u8]) -> c_ulong;
                fn helper(&self) -> &str { "zlib" }
            }
        };
        assert!(errors(item).is_empty());
    }

    #[test]
    fn test_elided_return_reference_rejected() {
        let item: ItemTrait = parse_quote! {
            trait Zlib {
                fn version(&self) -> &CStr;
                fn names(&self) -> Option<&'_ CStr>;
                fn table(&self) -> *const &u32;
            }
        };
        let errors = errors(item);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.contains("'static")));
    }

    #[test]
    fn test_receivers_and_generics_rejected() {
        let item: ItemTrait = parse_quote! {
            trait Zlib {
                fn by_value(self);
                fn by_mut(&mut self);
                fn generic<T>(&self, t: T);
                fn free();
            }
        };
        assert_eq!(errors(item).len(), 4);
    }
}
