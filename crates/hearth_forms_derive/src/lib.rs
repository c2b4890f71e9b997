use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Implements `hearth_forms::form::FormModel` for a struct with named fields.
///
/// Every field type must implement `serde::Serialize` and
/// `serde::de::DeserializeOwned`.
#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let model_ident = input.ident;
    let fields_struct_ident = format_ident!("{model_ident}Fields");

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let forms = forms_path();
    let mut field_names = Vec::new();
    let mut name_methods = Vec::new();
    let mut encoders = Vec::new();
    let mut decoders = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_name = field_ident.to_string();

        field_names.push(field_name.clone());
        name_methods.push(quote! {
            pub const fn #field_ident(&self) -> &'static str {
                #field_name
            }
        });
        encoders.push(quote! {
            values.insert(
                ::std::string::String::from(#field_name),
                #forms::form::encode_field(#field_name, &self.#field_ident)?,
            );
        });
        decoders.push(quote! {
            #field_ident: #forms::form::decode_field(values, #field_name)?,
        });
    }

    quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #fields_struct_ident;

        impl #fields_struct_ident {
            #(#name_methods)*
        }

        impl #forms::form::FormModel for #model_ident {
            type Fields = #fields_struct_ident;

            fn fields() -> Self::Fields {
                #fields_struct_ident
            }

            fn field_names() -> &'static [&'static str] {
                &[#(#field_names),*]
            }

            fn to_values(&self) -> #forms::form::FormResult<#forms::form::FieldValues> {
                let mut values = #forms::form::FieldValues::new();
                #(#encoders)*
                Ok(values)
            }

            fn from_values(
                values: &#forms::form::FieldValues,
            ) -> #forms::form::FormResult<Self> {
                Ok(Self {
                    #(#decoders)*
                })
            }
        }
    }
    .into()
}

fn forms_path() -> TokenStream2 {
    match crate_name("hearth_forms") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        // Integration tests of the crate itself also resolve to `Itself`.
        Ok(FoundCrate::Itself)
            if std::env::var("CARGO_CRATE_NAME").as_deref() == Ok("hearth_forms") =>
        {
            quote!(crate)
        }
        Ok(FoundCrate::Itself) | Err(_) => quote!(::hearth_forms),
    }
}
