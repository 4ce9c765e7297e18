use crate::utils::{derives_serde, has_field, inject_field};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, parse_macro_input};

/// #[aggregate_root] 宏实现
/// - 在末尾追加私有字段 `domain_events: DomainEvents`，该字段名保留给宏
/// - 结构体派生了 serde 时为该字段加上 `#[serde(skip)]`，事件不随聚合状态持久化
/// - 自动实现 `::monolith_domain::aggregate_root::AggregateRoot`
///
/// 聚合方法通过 `self.domain_events.record(event)` 记录事件。
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[aggregate_root] takes no arguments",
        )
        .to_compile_error()
        .into();
    }

    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[aggregate_root] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let with_serde = derives_serde(&st.attrs);

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    if has_field(fields_named, "domain_events") {
        return syn::Error::new(
            fields_named.span(),
            "field `domain_events` is reserved for the recorded domain events",
        )
        .to_compile_error()
        .into();
    }

    let field: syn::Field = if with_serde {
        syn::parse_quote! {
            #[serde(skip)]
            domain_events: ::monolith_domain::aggregate_root::DomainEvents
        }
    } else {
        syn::parse_quote! {
            domain_events: ::monolith_domain::aggregate_root::DomainEvents
        }
    };
    inject_field(fields_named, field, false);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let expanded = quote! {
        #st

        impl #impl_generics ::monolith_domain::aggregate_root::AggregateRoot for #ident #ty_generics #where_clause {
            fn pending_domain_events(&self) -> &[::monolith_domain::domain_event::SharedEvent] {
                self.domain_events.as_slice()
            }

            fn pop_domain_events(&mut self) -> ::std::vec::Vec<::monolith_domain::domain_event::SharedEvent> {
                self.domain_events.take()
            }
        }
    };

    TokenStream::from(expanded)
}
