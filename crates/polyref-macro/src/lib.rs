//! Procedural macros for polyref
//!
//! Provides `#[interface]`, the attribute that turns a plain Rust trait into
//! a capability interface:
//! - a `{Name}Vt` dispatch-table struct (one `unsafe fn` slot per operation,
//!   declaration order, `#[repr(C)]`)
//! - a `Vtable` impl that records the storage layout chosen for the table
//! - a blanket `VtableFor<T>` impl on the table struct that synthesizes a
//!   delegate for every operation of every implementing type (the vtable
//!   struct is the impl's self type so the blanket stays orphan-legal in
//!   downstream crates)
//! - `{Name}Ext` / `{Name}ExtMut` call surfaces for the handle types
//!
//! ## Options
//!
//! - `extends(Base)` - embed `BaseVt` as the leading table field and emit an
//!   `Extends<BaseVt>` impl for upcasting
//! - `no_self(a, b)` - tag the named operations as receiver-less; used by the
//!   declarative `define_interface!` macro to carry the tags through expansion
//!
//! Receiver-less operations may also be tagged directly with `#[no_self]` on
//! the method. An untagged method without a receiver is rejected: whether an
//! operation needs receiver access is an explicit declaration, never inferred
//! from the signature shape. Parameters must bind plain identifiers; the
//! names carry over into the slot signatures.

use std::collections::HashSet;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, FnArg, Ident, ItemTrait, Pat, TraitItem, Type, parse_macro_input,
    spanned::Spanned,
};

/// Path to the polyref crate in generated code.
fn crate_path() -> TokenStream2 {
    quote! { polyref }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration parsed from the `#[interface(...)]` attribute arguments.
#[derive(Default)]
struct InterfaceConfig {
    /// Base interface whose table is embedded as the leading field.
    extends: Option<Ident>,
    /// Names of operations declared receiver-less via `no_self(...)`.
    no_self: HashSet<String>,
}

/// How an operation receives its self-handle.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Receiver {
    /// `&self`: the slot takes a `ConstThis`.
    Const,
    /// `&mut self`: the slot takes a `MutThis`.
    Mut,
    /// No receiver: the slot still takes a `ConstThis` and ignores it.
    None,
}

struct MethodInfo {
    name: Ident,
    receiver: Receiver,
    param_names: Vec<Ident>,
    param_types: Vec<Type>,
    output: syn::ReturnType,
}

// =============================================================================
// Validation
// =============================================================================

/// Validate one trait method for dispatch-table compatibility.
fn validate_method(method: &syn::TraitItemFn, tagged_no_self: bool) -> Result<(), syn::Error> {
    let method_name = &method.sig.ident;
    let span = method_name.span();

    if method.sig.asyncness.is_some() {
        return Err(syn::Error::new(
            span,
            format!(
                "method '{}': async operations cannot fill a dispatch-table slot",
                method_name
            ),
        ));
    }

    if !method.sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            span,
            format!(
                "method '{}': generic operations cannot fill a dispatch-table slot",
                method_name
            ),
        ));
    }

    let mut has_receiver = false;
    for arg in &method.sig.inputs {
        match arg {
            FnArg::Receiver(receiver) => {
                has_receiver = true;
                if receiver.reference.is_none() {
                    return Err(syn::Error::new(
                        receiver.self_token.span(),
                        format!(
                            "method '{}': self by value is not supported. Use &self or &mut self",
                            method_name
                        ),
                    ));
                }
            }
            // Slot fields and shims reuse the declared parameter names;
            // destructuring patterns have none.
            FnArg::Typed(pat_type) => {
                if !matches!(pat_type.pat.as_ref(), Pat::Ident(_)) {
                    return Err(syn::Error::new(
                        span,
                        format!(
                            "method '{}': parameter patterns are not supported in \
                             dispatch-table slots. Bind a plain identifier",
                            method_name
                        ),
                    ));
                }
            }
        }
    }

    if has_receiver && tagged_no_self {
        return Err(syn::Error::new(
            span,
            format!(
                "method '{}': tagged no_self but declares a receiver",
                method_name
            ),
        ));
    }
    if !has_receiver && !tagged_no_self {
        return Err(syn::Error::new(
            span,
            format!(
                "method '{}': has no receiver. Tag it with #[no_self] (or the \
                 no_self(...) attribute argument) if the operation is independent \
                 of instance state",
                method_name
            ),
        ));
    }

    Ok(())
}

fn validate_trait(input: &ItemTrait) -> Result<(), syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.ident.span(),
            "generic traits cannot be interfaces: the dispatch table must be a \
             single 'static type",
        ));
    }
    Ok(())
}

// =============================================================================
// Attribute parsing
// =============================================================================

/// Check for a `#[no_self]` attribute on a method.
fn has_no_self_attr(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident("no_self"))
}

/// Parse `#[interface(...)]` options into an [`InterfaceConfig`].
fn parse_interface_config(attr: TokenStream) -> Result<InterfaceConfig, syn::Error> {
    let mut config = InterfaceConfig::default();

    if attr.is_empty() {
        return Ok(config);
    }

    let attr2: TokenStream2 = attr.into();
    let tokens: Vec<_> = attr2.into_iter().collect();

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            proc_macro2::TokenTree::Ident(ident) => {
                let name = ident.to_string();
                match name.as_str() {
                    "extends" => {
                        i += 1;
                        let Some(proc_macro2::TokenTree::Group(group)) = tokens.get(i) else {
                            return Err(syn::Error::new(
                                ident.span(),
                                "expected '(...)' after 'extends'",
                            ));
                        };
                        let base: Ident = syn::parse2(group.stream()).map_err(|_| {
                            syn::Error::new(
                                group.span(),
                                "expected an identifier inside 'extends(...)'",
                            )
                        })?;
                        config.extends = Some(base);
                        i += 1;
                    }
                    "no_self" => {
                        i += 1;
                        let Some(proc_macro2::TokenTree::Group(group)) = tokens.get(i) else {
                            return Err(syn::Error::new(
                                ident.span(),
                                "expected '(...)' after 'no_self'",
                            ));
                        };
                        for tt in group.stream() {
                            match tt {
                                proc_macro2::TokenTree::Ident(m) => {
                                    config.no_self.insert(m.to_string());
                                }
                                proc_macro2::TokenTree::Punct(p) if p.as_char() == ',' => {}
                                other => {
                                    return Err(syn::Error::new(
                                        other.span(),
                                        "expected method names inside 'no_self(...)'",
                                    ));
                                }
                            }
                        }
                        i += 1;
                    }
                    _ => {
                        return Err(syn::Error::new(
                            ident.span(),
                            format!(
                                "unknown option '{}', expected 'extends(...)' or 'no_self(...)'",
                                name
                            ),
                        ));
                    }
                }
            }
            proc_macro2::TokenTree::Punct(punct) if punct.as_char() == ',' => {
                i += 1; // Skip commas
            }
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "unexpected token in interface options",
                ));
            }
        }
    }

    Ok(config)
}

// =============================================================================
// Generation
// =============================================================================

fn interface_internal(
    config: InterfaceConfig,
    mut input: ItemTrait,
) -> Result<TokenStream2, syn::Error> {
    validate_trait(&input)?;

    let krate = crate_path();
    let trait_name = input.ident.clone();
    let vis = input.vis.clone();
    let vt_name = format_ident!("{}Vt", trait_name);
    let ext_name = format_ident!("{}Ext", trait_name);
    let ext_mut_name = format_ident!("{}ExtMut", trait_name);

    // Collect operation descriptors in declaration order.
    let mut methods: Vec<MethodInfo> = Vec::new();

    for item in &mut input.items {
        if let TraitItem::Fn(method) = item {
            let tagged = has_no_self_attr(&method.attrs)
                || config.no_self.contains(&method.sig.ident.to_string());
            validate_method(method, tagged)?;

            // The tag is ours; drop it from the re-emitted trait.
            method.attrs.retain(|attr| !attr.path().is_ident("no_self"));

            let receiver = if tagged {
                Receiver::None
            } else {
                let is_mut = method.sig.inputs.first().is_some_and(
                    |arg| matches!(arg, FnArg::Receiver(r) if r.mutability.is_some()),
                );
                if is_mut { Receiver::Mut } else { Receiver::Const }
            };

            let params: Vec<_> = method
                .sig
                .inputs
                .iter()
                .filter_map(|arg| {
                    if let FnArg::Typed(pat_type) = arg
                        && let Pat::Ident(pat_ident) = pat_type.pat.as_ref()
                    {
                        return Some((pat_ident.ident.clone(), (*pat_type.ty).clone()));
                    }
                    None
                })
                .collect();

            methods.push(MethodInfo {
                name: method.sig.ident.clone(),
                receiver,
                param_names: params.iter().map(|(n, _)| n.clone()).collect(),
                param_types: params.iter().map(|(_, t)| t.clone()).collect(),
                output: method.sig.output.clone(),
            });
        }
    }

    // Table slots, delegate shims and table initializer entries.
    let mut vt_fields = Vec::new();
    let mut shims = Vec::new();
    let mut vt_entries = Vec::new();

    for method in &methods {
        let name = &method.name;
        let shim_name = format_ident!("__{}", name);
        let param_names = &method.param_names;
        let param_types = &method.param_types;
        let output = &method.output;

        let this_ty = match method.receiver {
            Receiver::Mut => quote! { #krate::MutThis },
            Receiver::Const | Receiver::None => quote! { #krate::ConstThis },
        };

        vt_fields.push(quote! {
            pub #name: unsafe fn(
                this: #this_ty
                #(, #param_names: #param_types)*
            ) #output
        });

        // Delegate synthesis: a monomorphized shim per (operation, type).
        // Nested fns do not see the impl's type parameter, so each shim
        // carries its own.
        let shim = match method.receiver {
            Receiver::Const => quote! {
                unsafe fn #shim_name<T: #trait_name>(
                    this: #krate::ConstThis
                    #(, #param_names: #param_types)*
                ) #output {
                    // SAFETY: handles pair `this` with the table built for `T`.
                    unsafe { this.get::<T>() }.#name(#(#param_names),*)
                }
            },
            Receiver::Mut => quote! {
                unsafe fn #shim_name<T: #trait_name>(
                    this: #krate::MutThis
                    #(, #param_names: #param_types)*
                ) #output {
                    // SAFETY: handles pair `this` with the table built for `T`,
                    // and mutable slots are only reachable through exclusive
                    // handles.
                    unsafe { this.get::<T>() }.#name(#(#param_names),*)
                }
            },
            Receiver::None => quote! {
                unsafe fn #shim_name<T: #trait_name>(
                    _this: #krate::ConstThis
                    #(, #param_names: #param_types)*
                ) #output {
                    <T as #trait_name>::#name(#(#param_names),*)
                }
            },
        };
        shims.push(shim);

        vt_entries.push(quote! { #name: #shim_name::<T> });
    }

    // Storage layout, chosen once per interface: embed the table when it
    // cannot exceed one pointer (at most one slot), reference the singleton
    // otherwise. Extending interfaces inherit an unknown number of base
    // slots and stay indirect.
    let storage = if config.extends.is_none() && methods.len() <= 1 {
        quote! { #krate::Inline<Self> }
    } else {
        quote! { #krate::Indirect<Self> }
    };

    // Base interface embedding.
    let base_vt_name = config.extends.as_ref().map(|b| format_ident!("{}Vt", b));
    let base_field = base_vt_name.as_ref().map(|base_vt| {
        quote! { pub base: #base_vt, }
    });
    let base_entry = base_vt_name.as_ref().map(|base_vt| {
        quote! { base: <#base_vt as #krate::VtableFor<T>>::build(), }
    });
    let base_bound = base_vt_name.as_ref().map(|base_vt| {
        quote! { where #base_vt: #krate::VtableFor<T> }
    });
    let extends_impl = base_vt_name.as_ref().map(|base_vt| {
        quote! {
            // SAFETY: `base` is the leading `#[repr(C)]` field, so this table
            // starts with a complete base table.
            unsafe impl #krate::Extends<#base_vt> for #vt_name {
                #[inline]
                fn as_base(&'static self) -> &'static #base_vt {
                    &self.base
                }
            }
        }
    });

    // Call surfaces: const and no-self operations on {Name}Ext, mutating
    // operations on {Name}ExtMut.
    let mut ext_sigs = Vec::new();
    let mut ext_impls = Vec::new();
    let mut ext_mut_sigs = Vec::new();
    let mut ext_mut_impls = Vec::new();

    for method in &methods {
        let name = &method.name;
        let param_names = &method.param_names;
        let param_types = &method.param_types;
        let output = &method.output;

        match method.receiver {
            Receiver::Const | Receiver::None => {
                ext_sigs.push(quote! {
                    fn #name(&self #(, #param_names: #param_types)*) #output;
                });
                ext_impls.push(quote! {
                    #[inline]
                    fn #name(&self #(, #param_names: #param_types)*) #output {
                        // SAFETY: `AsDyn` guarantees `this` addresses a live
                        // value of the type the table was built for.
                        unsafe { (self.table().#name)(self.this() #(, #param_names)*) }
                    }
                });
            }
            Receiver::Mut => {
                ext_mut_sigs.push(quote! {
                    fn #name(&mut self #(, #param_names: #param_types)*) #output;
                });
                ext_mut_impls.push(quote! {
                    #[inline]
                    fn #name(&mut self #(, #param_names: #param_types)*) #output {
                        let this = self.this_mut();
                        // SAFETY: `AsDynMut` guarantees `this` addresses a live
                        // value of the built type with exclusive access.
                        unsafe { (self.table().#name)(this #(, #param_names)*) }
                    }
                });
            }
        }
    }

    let ext_mut = if ext_mut_sigs.is_empty() {
        quote! {}
    } else {
        quote! {
            #[doc = concat!("Mutating operations of [`", stringify!(#trait_name), "`].")]
            #vis trait #ext_mut_name: #ext_name {
                #(#ext_mut_sigs)*
            }

            impl<H: #krate::AsDynMut<#vt_name>> #ext_mut_name for H {
                #(#ext_mut_impls)*
            }
        }
    };

    let expanded = quote! {
        #input

        #[doc = concat!("Dispatch table for [`", stringify!(#trait_name), "`].")]
        #[repr(C)]
        #[derive(Clone, Copy)]
        #vis struct #vt_name {
            #base_field
            #(#vt_fields),*
        }

        impl #krate::Vtable for #vt_name {
            type Storage = #storage;
        }

        impl<T: #trait_name + 'static> #krate::VtableFor<T> for #vt_name #base_bound {
            fn build() -> Self {
                #(#shims)*

                Self {
                    #base_entry
                    #(#vt_entries),*
                }
            }
        }

        #extends_impl

        #[doc = concat!("Read-only operations of [`", stringify!(#trait_name), "`], callable through any handle.")]
        #vis trait #ext_name {
            #(#ext_sigs)*
        }

        impl<H: #krate::AsDyn<#vt_name>> #ext_name for H {
            #(#ext_impls)*
        }

        #ext_mut
    };

    Ok(expanded)
}

/// Declare a capability interface.
///
/// Applied to a plain trait; the trait itself is re-emitted unchanged (minus
/// `#[no_self]` tags) so concrete types implement it the ordinary way. For any
/// type implementing the trait, `{Name}Vt` automatically satisfies
/// `VtableFor<T>`; a type that does not implement it is rejected at compile
/// time wherever a handle pairing is attempted.
///
/// # Example
/// ```ignore
/// #[interface]
/// pub trait Shape {
///     fn area(&self) -> f64;
///     fn scale(&mut self, factor: f64);
///     #[no_self]
///     fn kind() -> &'static str;
/// }
/// ```
#[proc_macro_attribute]
pub fn interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);

    let config = match parse_interface_config(attr) {
        Ok(config) => config,
        Err(err) => return err.to_compile_error().into(),
    };

    match interface_internal(config, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
