//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations from a
//! `#[error("...")]` attribute on every variant.
//!
//! # Usage
//!
//! ```ignore
//! use asmtrace_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VMError {
//!     #[error("stack underflow")]
//!     StackUnderflow,
//!
//!     #[error("unknown register '{0}'")]
//!     UnknownRegister(String),
//!
//!     #[error("line {line}: duplicate label '{label}'")]
//!     DuplicateLabel { line: usize, label: String },
//! }
//! ```
//!
//! Fields are only passed to `write!` when the message mentions them, so a
//! variant may carry context that its message does not print.

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, Lit, Meta, Variant, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Error derive only supports enums",
        ));
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let arms = display_arms(data)?;

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

fn display_arms(data: &DataEnum) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    data.variants
        .iter()
        .map(|variant| {
            let ident = &variant.ident;
            let message = error_message(variant)?;

            let arm = match &variant.fields {
                Fields::Unit => quote! {
                    Self::#ident => write!(f, #message),
                },
                Fields::Unnamed(fields) => {
                    let bindings: Vec<Ident> = (0..fields.unnamed.len())
                        .map(|i| format_ident!("f{}", i))
                        .collect();
                    let message = positional_to_named(&message, bindings.len());
                    let used: Vec<&Ident> = bindings
                        .iter()
                        .filter(|b| mentions(&message, &b.to_string()))
                        .collect();
                    let patterns = bindings.iter().map(|b| {
                        if used.contains(&b) {
                            quote! { #b }
                        } else {
                            quote! { _ }
                        }
                    });
                    quote! {
                        Self::#ident(#(#patterns),*) => write!(f, #message, #(#used = #used),*),
                    }
                }
                Fields::Named(fields) => {
                    let used: Vec<&Ident> = fields
                        .named
                        .iter()
                        .filter_map(|field| field.ident.as_ref())
                        .filter(|field| mentions(&message, &field.to_string()))
                        .collect();
                    quote! {
                        Self::#ident { #(#used,)* .. } => write!(f, #message, #(#used = #used),*),
                    }
                }
            };

            Ok(arm)
        })
        .collect()
}

/// Reads the string literal out of a variant's `#[error("...")]` attribute.
fn error_message(variant: &Variant) -> syn::Result<String> {
    let attr = variant
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &variant.ident,
                format!(
                    "missing #[error(\"...\")] attribute on variant `{}`",
                    variant.ident
                ),
            )
        })?;

    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };

    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(lit)) => Ok(lit.value()),
        _ => Err(syn::Error::new(
            Span::call_site(),
            format!(
                "#[error] on variant `{}` must be a string literal, e.g. #[error(\"stack overflow\")]",
                variant.ident
            ),
        )),
    }
}

/// Rewrites `{0}`, `{1:?}` into `{f0}`, `{f1:?}` so tuple fields can be passed by name.
fn positional_to_named(message: &str, field_count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..field_count).rev() {
        out = out
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    out
}

/// Whether the format string interpolates `name`, with or without a format spec.
fn mentions(message: &str, name: &str) -> bool {
    message.contains(&format!("{{{name}}}")) || message.contains(&format!("{{{name}:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_placeholders_become_named() {
        assert_eq!(positional_to_named("bad {0} at {1}", 2), "bad {f0} at {f1}");
        assert_eq!(positional_to_named("value {0:?}", 1), "value {f0:?}");
        assert_eq!(positional_to_named("no fields", 0), "no fields");
    }

    #[test]
    fn mentions_detects_plain_and_formatted_fields() {
        assert!(mentions("line {line}: oops", "line"));
        assert!(mentions("value {value:>8}", "value"));
        assert!(!mentions("line {line}", "label"));
        assert!(!mentions("{{line}}", "lin"));
    }
}
