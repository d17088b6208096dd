#![doc = include_str!("../README.md")]

mod contract;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::ToTokens;
use syn::{Item, parse_macro_input};

// 与 decoy_rt::WELL_KNOWN_MARKERS 保持一致。
const FIELD_MARKERS: &[&str] = &["inject", "autowired", "resource", "wired"];

#[proc_macro_attribute]
pub fn subject(attr: TokenStream, item: TokenStream) -> TokenStream {
    if let Err(err) = check_subject_args(attr) {
        return err.to_compile_error().into();
    }

    let item = parse_macro_input!(item as Item);
    let Item::Struct(mut item_struct) = item else {
        return syn::Error::new(Span::call_site(), "#[subject] 只能用于结构体")
            .to_compile_error()
            .into();
    };
    for field in item_struct.fields.iter_mut() {
        field.attrs.retain(|attr| !is_field_marker(attr));
    }
    item_struct.into_token_stream().into()
}

fn check_subject_args(attr: TokenStream) -> syn::Result<()> {
    if attr.is_empty() {
        return Ok(());
    }
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("extends") {
            let _: syn::Ident = meta.value()?.parse()?;
            return Ok(());
        }
        Err(meta.error("未知的参数：只支持 extends = 字段名"))
    });
    syn::parse::Parser::parse(parser, attr)
}

fn is_field_marker(attr: &syn::Attribute) -> bool {
    let last = attr.path().segments.last().map(|s| s.ident.to_string());
    matches!(last.as_deref(), Some(n) if FIELD_MARKERS.contains(&n))
}

/// 为协作者 trait 生成 `<Trait>Double` 与 `decoy_rt::Contract` 实现。
#[proc_macro_attribute]
pub fn contract(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(Span::call_site(), "#[contract] 不接受参数")
            .to_compile_error()
            .into();
    }
    let item_trait = parse_macro_input!(item as syn::ItemTrait);
    match contract::expand(item_trait) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_attribute]
pub fn inject(_attr: TokenStream, item: TokenStream) -> TokenStream {
    item
}

#[proc_macro_attribute]
pub fn autowired(_attr: TokenStream, item: TokenStream) -> TokenStream {
    item
}

#[proc_macro_attribute]
pub fn resource(_attr: TokenStream, item: TokenStream) -> TokenStream {
    item
}

#[proc_macro_attribute]
pub fn wired(_attr: TokenStream, item: TokenStream) -> TokenStream {
    item
}
