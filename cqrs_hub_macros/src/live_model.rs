use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr};

pub fn derive_live_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    // #[live_model(name = "...")] on the struct
    let model_name = extract_model_name(&input);

    // Field marked #[live_model(id)], falling back to `id`
    let id_field = match extract_id_field(&input) {
        Ok(field) => field,
        Err(err) => return err.to_compile_error().into(),
    };

    let expanded = quote! {
        impl cqrs_hub::LiveModel for #name {
            const MODEL_NAME: &'static str = #model_name;

            fn model_id(&self) -> ::std::string::String {
                ::std::string::ToString::to_string(&self.#id_field)
            }
        }
    };

    TokenStream::from(expanded)
}

fn extract_model_name(input: &DeriveInput) -> String {
    for attr in &input.attrs {
        if !attr.path().is_ident("live_model") {
            continue;
        }

        let mut model_name = None;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                model_name = Some(value.value());
            }
            Ok(())
        });

        if let Some(n) = model_name {
            return n;
        }
    }

    to_snake_case(&input.ident.to_string())
}

fn extract_id_field(input: &DeriveInput) -> syn::Result<Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "LiveModel derive: only structs with named fields are supported",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "LiveModel derive: only structs with named fields are supported",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("live_model") {
                continue;
            }
            let mut is_id = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    is_id = true;
                }
                Ok(())
            })?;
            if is_id {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .find(|ident| *ident == "id")
        .cloned()
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "LiveModel derive: no field marked with #[live_model(id)] and no field named `id`",
            )
        })
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
