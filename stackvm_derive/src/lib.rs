//! Derive macros for the stackvm crate.
//!
//! Provides `#[derive(Error)]`, which implements `Display` and
//! `std::error::Error` from `#[error("...")]` attributes.

mod error;

use proc_macro::TokenStream;

/// Automatically implements `Display` and `Error` traits for error types.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
