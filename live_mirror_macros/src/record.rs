use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, FieldsNamed, Ident, LitStr};

pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let collection = extract_collection(input)?;
    let fields = named_fields(input)?;
    let id_field = marked_field(fields, "id")?.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Record derive: no field marked with #[record(id)] and no field named `id`",
        )
    })?;
    let created_at_field = marked_field(fields, "created_at")?.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Record derive: no field marked with #[record(created_at)] and no field named `created_at`",
        )
    })?;

    Ok(quote! {
        impl #impl_generics ::live_mirror::Record for #name #ty_generics #where_clause {
            const COLLECTION: &'static str = #collection;

            fn id(&self) -> &str {
                &self.#id_field
            }

            fn created_at(&self) -> ::live_mirror::Timestamp {
                self.#created_at_field
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<&FieldsNamed> {
    if let Data::Struct(data_struct) = &input.data {
        if let Fields::Named(fields) = &data_struct.fields {
            return Ok(fields);
        }
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        "Record derive: only structs with named fields are supported",
    ))
}

fn extract_collection(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        let mut collection = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported #[record] attribute on struct"))
            }
        })?;

        if let Some(c) = collection {
            return Ok(c);
        }
    }

    let name = input.ident.to_string();
    Ok(format!("{}s", to_snake_case(&name)))
}

/// Field tagged `#[record(<marker>)]`, falling back to a field named `<marker>`.
fn marked_field(fields: &FieldsNamed, marker: &str) -> syn::Result<Option<Ident>> {
    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }

            let mut tagged = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(marker) {
                    tagged = true;
                }
                Ok(())
            })?;
            if tagged {
                return Ok(field.ident.clone());
            }
        }
    }

    Ok(fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .find(|ident| *ident == marker)
        .cloned())
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
