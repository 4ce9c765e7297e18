use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::{Attribute, Field, FieldsNamed, Path, Token};

/// 结构体/枚举上的 derive 列表，按名称去重
///
/// `serde::Serialize` 与 `Serialize` 视为同一项，宏要求的派生排在用户派生之前。
pub(crate) struct Derives {
    paths: Vec<Path>,
    keys: Vec<String>,
}

impl Derives {
    pub(crate) fn required(paths: impl IntoIterator<Item = Path>) -> Self {
        let mut derives = Self {
            paths: Vec::new(),
            keys: Vec::new(),
        };
        derives.extend(paths);
        derives
    }

    fn extend(&mut self, paths: impl IntoIterator<Item = Path>) {
        for path in paths {
            let key = derive_key(&path);
            if !self.keys.contains(&key) {
                self.keys.push(key);
                self.paths.push(path);
            }
        }
    }

    /// 吸收 `attrs` 中已有的 derive，并以一条合并后的 derive 替换它们
    pub(crate) fn apply_to(mut self, attrs: &mut Vec<Attribute>) {
        let (existing, others): (Vec<Attribute>, Vec<Attribute>) =
            attrs.drain(..).partition(|a| a.path().is_ident("derive"));
        for attr in &existing {
            if let Ok(list) = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)
            {
                self.extend(list);
            }
        }
        let paths = &self.paths;
        attrs.push(syn::parse_quote!(#[derive(#(#paths),*)]));
        attrs.extend(others);
    }
}

fn derive_key(path: &Path) -> String {
    match path.segments.last() {
        Some(seg) if seg.ident == "Serialize" || seg.ident == "Deserialize" => {
            format!("serde::{}", seg.ident)
        }
        Some(seg) => seg.ident.to_string(),
        None => path.to_token_stream().to_string(),
    }
}

/// 是否派生了 serde（此时注入的字段需要 serde 属性）
pub(crate) fn derives_serde(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("derive"))
        .filter_map(|a| {
            a.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)
                .ok()
        })
        .flatten()
        .any(|p| derive_key(&p).starts_with("serde::"))
}

pub(crate) fn has_field(fields: &FieldsNamed, name: &str) -> bool {
    fields
        .named
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|i| i == name))
}

/// 注入宏提供的字段；`first` 为 true 时放在最前
pub(crate) fn inject_field(fields: &mut FieldsNamed, field: Field, first: bool) {
    if first {
        fields.named.insert(0, field);
    } else {
        fields.named.push(field);
    }
}
