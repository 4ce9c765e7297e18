use crate::utils::Derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// 值对象：按值相等、可序列化、无标识
/// - 适用于结构体（具名或 tuple）与枚举
/// - 合并/追加派生：Clone, (Debug 可控), Serialize, Deserialize, PartialEq, Eq
/// - 单字段 tuple struct 额外生成 `as_inner()`；`display = true` 时委托内部值实现 `Display`
/// - 参数：`#[value_object(debug = true|false, display = true|false)]`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as ValueObjectAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];

    if cfg.debug.unwrap_or(true) {
        required.insert(0, syn::parse_quote!(Debug));
    }

    match &mut input {
        Item::Struct(st) => {
            Derives::required(required).apply_to(&mut st.attrs);

            let newtype = match &st.fields {
                syn::Fields::Unnamed(f) if f.unnamed.len() == 1 => {
                    f.unnamed.first().map(|field| field.ty.clone())
                }
                _ => None,
            };

            let ident = &st.ident;
            let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

            let accessor = newtype.as_ref().map(|inner| {
                quote! {
                    impl #impl_generics #ident #ty_generics #where_clause {
                        pub fn as_inner(&self) -> &#inner {
                            &self.0
                        }
                    }
                }
            });

            let display = match (&newtype, cfg.display.unwrap_or(false)) {
                (Some(_), true) => Some(quote! {
                    impl #impl_generics ::std::fmt::Display for #ident #ty_generics #where_clause {
                        fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                            ::std::fmt::Display::fmt(&self.0, f)
                        }
                    }
                }),
                (None, true) => {
                    return syn::Error::new(
                        st.span(),
                        "`display = true` requires a tuple struct with exactly one field",
                    )
                    .to_compile_error()
                    .into();
                }
                _ => None,
            };

            TokenStream::from(quote! {
                #st
                #accessor
                #display
            })
        }
        Item::Enum(en) => {
            if cfg.display.unwrap_or(false) {
                return syn::Error::new(en.span(), "`display` is not supported on enums")
                    .to_compile_error()
                    .into();
            }
            Derives::required(required).apply_to(&mut en.attrs);
            TokenStream::from(quote! { #en })
        }
        other => syn::Error::new(other.span(), "#[value_object] only supports struct or enum")
            .to_compile_error()
            .into(),
    }
}

#[derive(Default)]
struct ValueObjectAttrConfig {
    debug: Option<bool>,
    display: Option<bool>,
}

impl Parse for ValueObjectAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut cfg = Self::default();
        if input.is_empty() {
            return Ok(cfg);
        }

        let pairs: Punctuated<BoolFlag, Token![,]> = Punctuated::parse_terminated(input)?;
        for flag in pairs {
            let slot = match flag.key.to_string().as_str() {
                "debug" => &mut cfg.debug,
                "display" => &mut cfg.display,
                _ => {
                    return Err(syn::Error::new(
                        flag.key.span(),
                        "unknown key in attribute; expected 'debug' or 'display'",
                    ));
                }
            };
            if slot.is_some() {
                return Err(syn::Error::new(
                    flag.key.span(),
                    format!("duplicate key '{}' in attribute", flag.key),
                ));
            }
            *slot = Some(flag.value);
        }
        Ok(cfg)
    }
}

// `key = true|false`
struct BoolFlag {
    key: syn::Ident,
    value: bool,
}

impl Parse for BoolFlag {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        let lit: syn::LitBool = input.parse().map_err(|e| {
            syn::Error::new(e.span(), format!("expected boolean literal for '{key}'"))
        })?;
        Ok(Self {
            key,
            value: lit.value(),
        })
    }
}
