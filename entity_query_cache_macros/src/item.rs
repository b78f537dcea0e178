use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr};

pub fn derive_item(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let id_field = marked_field(input, "id")?
        .or_else(|| field_named(input, "id"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "Item derive: no field marked with #[item(id)] and no field named `id`",
            )
        })?;

    let collection_body = match (collection_name(input)?, marked_field(input, "collection")?) {
        (Some(fixed), None) => quote! {
            ::entity_query_cache::CollectionKey::from(#fixed)
        },
        (None, Some(field)) => quote! {
            ::entity_query_cache::CollectionKey::from(::std::clone::Clone::clone(&self.#field))
        },
        (Some(_), Some(field)) => {
            return Err(syn::Error::new_spanned(
                field,
                "Item derive: use either #[item(collection = \"...\")] or #[item(collection)], not both",
            ))
        }
        (None, None) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Item derive: mark the collection field with #[item(collection)] or set #[item(collection = \"...\")]",
            ))
        }
    };

    let global_id_fn = marked_field(input, "global_id")?.map(|field| {
        quote! {
            fn global_id(&self) -> ::std::option::Option<::std::string::String> {
                ::std::convert::Into::into(::std::clone::Clone::clone(&self.#field))
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::entity_query_cache::Item for #name #ty_generics #where_clause {
            fn id(&self) -> ::entity_query_cache::ItemId {
                ::entity_query_cache::ItemId::from(::std::clone::Clone::clone(&self.#id_field))
            }

            fn collection_key(&self) -> ::entity_query_cache::CollectionKey {
                #collection_body
            }

            #global_id_fn
        }
    })
}

/// Struct-level `#[item(collection = "...")]`.
fn collection_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut collection = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("item") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported item attribute"))
            }
        })?;
    }
    Ok(collection)
}

/// The field carrying `#[item(<marker>)]`, if any.
fn marked_field(input: &DeriveInput, marker: &str) -> syn::Result<Option<Ident>> {
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Item derive only supports structs",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Item derive requires named fields",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("item") {
                continue;
            }
            let mut found = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(marker) {
                    found = true;
                }
                Ok(())
            })?;
            if found {
                return Ok(field.ident.clone());
            }
        }
    }

    Ok(None)
}

fn field_named(input: &DeriveInput, name: &str) -> Option<Ident> {
    if let Data::Struct(data_struct) = &input.data {
        if let Fields::Named(fields) = &data_struct.fields {
            return fields
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .find(|ident| *ident == name)
                .cloned();
        }
    }
    None
}
