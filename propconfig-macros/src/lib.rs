//! Proc macros for the propconfig crate.
//!
//! This crate provides the `#[derive(PropertySet)]` and `#[derive(ConfigEnum)]` macros

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input, spanned::Spanned};

/// Options parsed from a `#[property(...)]` field attribute.
#[derive(Default)]
struct FieldOptions {
    skip: bool,
}

impl FieldOptions {
    fn from_attrs(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();

        for attr in attrs {
            if attr.path().is_ident("property") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("skip") {
                        options.skip = true;
                    } else {
                        return Err(syn::Error::new(
                            meta.path.span(),
                            format!("unknown property attribute: {:?}", meta.path.get_ident()),
                        ));
                    }
                    Ok(())
                })?;
            }
        }

        Ok(options)
    }
}

/// Derive macro for the `PropertySet` trait.
///
/// Every named field is registered as a property, in declaration order, unless
/// it is marked `#[property(skip)]`. Registered fields must implement
/// `propconfig::Property`; anything else is a compile error.
///
/// # Example
///
/// ```rust,ignore
/// use propconfig::{NonNull, Nullable, PropertySet};
///
/// #[derive(PropertySet)]
/// struct AppSettings {
///     theme: NonNull<String>,
///     volume: Nullable<i32>,
///     #[property(skip)]
///     session_started: bool,
/// }
/// ```
///
/// This expands to roughly:
///
/// ```rust,ignore
/// impl propconfig::PropertySet for AppSettings {
///     fn properties(&self) -> Vec<&dyn propconfig::Property> {
///         vec![&self.theme as &dyn propconfig::Property, &self.volume]
///     }
///
///     fn properties_mut(&mut self) -> Vec<&mut dyn propconfig::Property> {
///         vec![&mut self.theme as &mut dyn propconfig::Property, &mut self.volume]
///     }
/// }
/// ```
#[proc_macro_derive(PropertySet, attributes(property))]
pub fn derive_property_set(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_property_set_impl(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_property_set_impl(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "PropertySet can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "PropertySet can only be derived for structs",
            ));
        }
    };

    let mut idents = Vec::new();
    for field in fields {
        if FieldOptions::from_attrs(&field.attrs)?.skip {
            continue;
        }
        if let Some(ident) = &field.ident {
            idents.push(ident);
        }
    }

    Ok(quote! {
        impl #impl_generics ::propconfig::PropertySet for #name #ty_generics #where_clause {
            fn properties(&self) -> ::std::vec::Vec<&dyn ::propconfig::Property> {
                ::std::vec![#(&self.#idents as &dyn ::propconfig::Property),*]
            }

            fn properties_mut(&mut self) -> ::std::vec::Vec<&mut dyn ::propconfig::Property> {
                ::std::vec![#(&mut self.#idents as &mut dyn ::propconfig::Property),*]
            }
        }
    })
}

/// Derive macro for the `ConfigEnum` trait.
///
/// Only unit variants are supported. The saved name of each variant is its
/// identifier, and its ordinal is its position in the declaration. The enum
/// also gets a `Serializable` impl saving it by name.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, ConfigEnum)]
/// enum UserType {
///     Admin,
///     User,
///     Guest,
/// }
/// ```
#[proc_macro_derive(ConfigEnum)]
pub fn derive_config_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_config_enum_impl(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_config_enum_impl(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "ConfigEnum can only be derived for enums",
        ));
    };

    if data.variants.is_empty() {
        return Err(syn::Error::new(
            input.span(),
            "ConfigEnum requires at least one variant",
        ));
    }

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "ConfigEnum variants must not carry data",
            ));
        }
        variants.push(&variant.ident);
    }

    let names = variants.iter().map(|v| v.to_string());
    let ordinals = 0..variants.len();

    Ok(quote! {
        impl #impl_generics ::propconfig::ConfigEnum for #name #ty_generics #where_clause {
            const VARIANTS: &'static [Self] = &[#(Self::#variants),*];

            fn name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #names,)*
                }
            }

            fn ordinal(&self) -> usize {
                match self {
                    #(Self::#variants => #ordinals,)*
                }
            }
        }

        impl #impl_generics ::propconfig::serializer::Serializable for #name #ty_generics #where_clause {
            fn serializer() -> ::propconfig::serializer::SharedSerializer<Self> {
                ::std::sync::Arc::new(::propconfig::serializer::EnumSerializer::<Self>::new())
            }
        }
    })
}
