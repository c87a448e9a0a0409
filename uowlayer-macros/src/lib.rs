//! Procedural macros for the uowlayer project.
//!
//! Provides `#[derive(Document)]`, which implements `uowlayer::document::Document`
//! for a struct with named fields.
//!
//! - The identity field is the one marked `#[document(id)]`, or else the field named `id`.
//!   It still has to serialize as `_id`, usually through `#[serde(rename = "_id")]`.
//! - The type name defaults to the struct's name and can be set with
//!   `#[document(name = "...")]` on the struct.
//!
//! ```ignore
//! use serde::{Deserialize, Serialize};
//! use uowlayer::Document;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(name = "Invoice")]
//! pub struct InvoiceRecord {
//!     #[serde(rename = "_id")]
//!     #[document(id)]
//!     pub number: i64,
//!     pub total: f64,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as uowlayer_macros;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, LitStr, parse_macro_input, spanned::Spanned};

#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_document(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_document(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let type_name = document_name(&input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "Document can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "Document can only be derived for structs; implement it by hand for enums",
            ));
        }
    };

    let id_field = identity_field(fields.iter(), input.ident.span())?;
    let id_ident = &id_field.ident;
    let id_type = &id_field.ty;

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::uowlayer::document::Document for #ident #ty_generics #where_clause {
            type Id = #id_type;

            fn id(&self) -> &Self::Id {
                &self.#id_ident
            }

            fn type_name() -> &'static str {
                #type_name
            }
        }
    })
}

/// The `#[document(name = "...")]` value, or the struct's own name.
fn document_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("document")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported document attribute, expected `name = \"...\"`"))
            }
        })?;
    }

    Ok(name.unwrap_or_else(|| input.ident.to_string()))
}

fn is_marked_id(field: &Field) -> syn::Result<bool> {
    let mut marked = false;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("document")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("unsupported document field attribute, expected `id`"))
            }
        })?;
    }

    Ok(marked)
}

fn identity_field<'a>(
    fields: impl Iterator<Item = &'a Field> + Clone,
    span: proc_macro2::Span,
) -> syn::Result<&'a Field> {
    let mut marked = Vec::new();
    for field in fields.clone() {
        if is_marked_id(field)? {
            marked.push(field);
        }
    }

    match marked.as_slice() {
        [field] => return Ok(field),
        [_, second, ..] => {
            return Err(syn::Error::new(
                second.span(),
                "only one field can be marked #[document(id)]",
            ));
        }
        [] => {}
    }

    fields
        .into_iter()
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "id"))
        .ok_or_else(|| {
            syn::Error::new(
                span,
                "no identity field: mark one with #[document(id)] or name it `id`",
            )
        })
}
