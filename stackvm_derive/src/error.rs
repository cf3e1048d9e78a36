//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations from
//! `#[error("...")]` attributes.
//!
//! # Usage
//!
//! ```ignore
//! use stackvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VMError {
//!     #[error("undefined opcode 0x{opcode:02x} at offset {offset}")]
//!     UndefinedOpcode { opcode: u8, offset: usize },
//!
//!     #[error("io error: {0}")]
//!     Io(String),
//!
//!     #[error("division by zero")]
//!     DivisionByZero,
//! }
//! ```
//!
//! Only the fields that a message actually mentions are passed to `write!`,
//! so a message may leave some fields out.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `Display` and `Error` for an enum or struct.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data_enum) => {
            let arms = data_enum
                .variants
                .iter()
                .map(|variant| {
                    let message = error_message(
                        &variant.attrs,
                        &variant.ident,
                        &format!("variant `{}`", variant.ident),
                    )?;
                    let ident = &variant.ident;
                    Ok(display_arm(quote!(Self::#ident), &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data_struct) => {
            let message = error_message(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;
            let arm = display_arm(quote!(Self), &data_struct.fields, &message);

            quote! {
                match self {
                    #arm
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds one `pattern => write!(..)` match arm.
///
/// Fields not named in the message are bound to `_`.
fn display_arm(path: TokenStream2, fields: &Fields, message: &str) -> TokenStream2 {
    let used = placeholders(message);

    match fields {
        Fields::Unit => quote! {
            #path => write!(f, #message),
        },
        Fields::Unnamed(unnamed) => {
            let mut format_str = message.to_string();
            let mut patterns = Vec::with_capacity(unnamed.unnamed.len());
            let mut args = Vec::new();
            for i in 0..unnamed.unnamed.len() {
                let position = i.to_string();
                if used.iter().any(|u| *u == position) {
                    let binding = format_ident!("f{}", i);
                    format_str = rename_positional(&format_str, i);
                    args.push(quote!(#binding = #binding));
                    patterns.push(binding.into_token_stream());
                } else {
                    patterns.push(quote!(_));
                }
            }
            quote! {
                #path(#(#patterns),*) => write!(f, #format_str #(, #args)*),
            }
        }
        Fields::Named(named) => {
            let bindings: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| used.iter().any(|u| ident == &u.as_str()))
                .collect();
            quote! {
                #path { #(#bindings,)* .. } => write!(f, #message #(, #bindings = #bindings)*),
            }
        }
    }
}

/// Returns the argument names referenced by `{name}` / `{name:spec}` in a format string.
///
/// Escaped braces (`{{`, `}}`) are skipped.
fn placeholders(message: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = message.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            continue;
        }
        let mut name = String::new();
        for c in chars.by_ref() {
            if c == '}' || c == ':' {
                break;
            }
            name.push(c);
        }
        let name = name.trim().to_string();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }

    names
}

/// Rewrites `{i}` and `{i:` into `{fi}` and `{fi:` for tuple fields.
fn rename_positional(format_str: &str, index: usize) -> String {
    format_str
        .replace(&format!("{{{index}}}"), &format!("{{f{index}}}"))
        .replace(&format!("{{{index}:"), &format!("{{f{index}:"))
}

/// Extracts the string from an `#[error("...")]` attribute.
fn error_message<T: ToTokens>(
    attrs: &[Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            format!(
                "missing #[error(\"...\")] attribute on {target_desc}; every error variant must declare a display message"
            ),
        ));
    };

    attr.parse_args::<LitStr>()
        .map(|lit| lit.value())
        .map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute: expected a string literal like #[error(\"stack overflow\")]",
            )
        })
}
