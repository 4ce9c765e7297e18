use crate::utils::{Derives, has_field, inject_field};
use proc_macro::TokenStream;
use quote::quote;
use regex::Regex;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

// 与 `monolith_domain::domain_event::EVENT_TYPE_PATTERN` 保持一致
const EVENT_TYPE_PATTERN: &str = r"^[a-z]+\.[A-Z][a-zA-Z]+$";

/// #[domain_event] 宏实现
/// - 仅支持具名字段结构体
/// - 在最前注入 `#[serde(flatten)] base: BaseEvent`（id/type/timestamp/aggregate_id）
/// - 合并派生：Debug, Clone, Serialize, Deserialize
/// - 生成 `Event`、`TypedEvent` 实现，以及 `new(aggregate_id, <业务字段>...)` 构造函数
/// - 参数：`#[domain_event(event_type = "module.PastTenseVerb")]`，编译期校验命名
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let st = match &mut input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(
                other.span(),
                "#[domain_event] can only be used on named-field structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let Some(type_lit) = cfg.event_type else {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "missing `event_type = \"module.PastTenseVerb\"`",
        )
        .to_compile_error()
        .into();
    };

    match Regex::new(EVENT_TYPE_PATTERN) {
        Ok(re) if re.is_match(&type_lit.value()) => {}
        Ok(_) => {
            return syn::Error::new(
                type_lit.span(),
                format!(
                    "invalid event type `{}`: expected `module.PastTenseVerb`, e.g. `users.UserDeleted`",
                    type_lit.value()
                ),
            )
            .to_compile_error()
            .into();
        }
        Err(err) => {
            return syn::Error::new(type_lit.span(), err.to_string())
                .to_compile_error()
                .into();
        }
    }

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(
                st.span(),
                "#[domain_event] supports only named-field structs, e.g. struct E { x: T }",
            )
            .to_compile_error()
            .into();
        }
    };

    for reserved in ["base", "aggregate_id"] {
        if has_field(fields_named, reserved) {
            return syn::Error::new(
                fields_named.span(),
                format!("field `{reserved}` is reserved; it is provided by the injected BaseEvent"),
            )
            .to_compile_error()
            .into();
        }
    }

    // 业务字段（注入 base 之前）用于生成构造函数参数
    let payload: Vec<(syn::Ident, syn::Type)> = fields_named
        .named
        .iter()
        .filter_map(|f| f.ident.clone().map(|i| (i, f.ty.clone())))
        .collect();

    inject_field(
        fields_named,
        syn::parse_quote! {
            #[serde(flatten)]
            base: ::monolith_domain::domain_event::BaseEvent
        },
        true,
    );

    let required: [syn::Path; 4] = [
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    Derives::required(required).apply_to(&mut st.attrs);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();
    let arg_names: Vec<&syn::Ident> = payload.iter().map(|(i, _)| i).collect();
    let arg_types: Vec<&syn::Type> = payload.iter().map(|(_, t)| t).collect();

    let expanded = quote! {
        #st

        impl #impl_generics #ident #ty_generics #where_clause {
            /// 以当前时间与新的事件 ID 构造事件
            pub fn new(aggregate_id: impl Into<String>, #(#arg_names: #arg_types),*) -> Self {
                Self {
                    base: ::monolith_domain::domain_event::BaseEvent::new(
                        <Self as ::monolith_domain::domain_event::TypedEvent>::EVENT_TYPE,
                        aggregate_id,
                    ),
                    #(#arg_names),*
                }
            }

            pub fn base(&self) -> &::monolith_domain::domain_event::BaseEvent {
                &self.base
            }
        }

        impl #impl_generics ::monolith_domain::domain_event::Event for #ident #ty_generics #where_clause {
            fn event_id(&self) -> &str {
                self.base.id()
            }

            fn event_type(&self) -> &::monolith_domain::domain_event::EventType {
                self.base.event_type()
            }

            fn occurred_at(&self) -> ::monolith_domain::domain_event::Timestamp {
                self.base.occurred_at()
            }

            fn aggregate_id(&self) -> &str {
                self.base.aggregate_id()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl #impl_generics ::monolith_domain::domain_event::TypedEvent for #ident #ty_generics #where_clause {
            const EVENT_TYPE: ::monolith_domain::domain_event::EventType =
                ::monolith_domain::domain_event::EventType::from_static(#type_lit);
        }
    };

    TokenStream::from(expanded)
}

struct EventAttrConfig {
    event_type: Option<LitStr>,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut event_type: Option<LitStr> = None;
        let pairs: Punctuated<EventAttrElem, Token![,]> = Punctuated::parse_terminated(input)?;

        for elem in pairs {
            match elem {
                EventAttrElem::EventType(lit) => {
                    if event_type.is_some() {
                        return Err(syn::Error::new(
                            lit.span(),
                            "duplicate key 'event_type' in attribute",
                        ));
                    }
                    event_type = Some(lit);
                }
            }
        }
        Ok(Self { event_type })
    }
}

enum EventAttrElem {
    EventType(LitStr),
}

impl Parse for EventAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        if key == "event_type" {
            let _eq: Token![=] = input.parse()?;
            Ok(Self::EventType(input.parse()?))
        } else {
            Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'event_type'",
            ))
        }
    }
}
