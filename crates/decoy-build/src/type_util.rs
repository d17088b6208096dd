use anyhow::Result;
use quote::ToTokens;
use syn::Type;

use crate::model::{Reach, ScanCtx, TypeRef};

pub(crate) fn type_key(ty: &Type) -> Result<String> {
    Ok(ty.to_token_stream().to_string())
}

/// 单段路径按当前模块补全成 `crate::m::Name`；其余类型原样作为 key。
pub(crate) fn type_ref_from_type(ty: &Type, ctx: &ScanCtx) -> Result<TypeRef> {
    let mut ty = ty.clone();

    if let Type::Path(tp) = &mut ty {
        if tp.qself.is_none()
            && tp.path.leading_colon.is_none()
            && tp.path.segments.len() == 1
            && tp.path.segments[0].ident != "Self"
        {
            let original = tp.path.segments[0].clone();
            let mut segments = Vec::<syn::PathSegment>::new();
            segments.push(syn::PathSegment {
                ident: syn::Ident::new("crate", original.ident.span()),
                arguments: syn::PathArguments::None,
            });
            for m in &ctx.module_path {
                segments.push(syn::PathSegment {
                    ident: syn::Ident::new(m, original.ident.span()),
                    arguments: syn::PathArguments::None,
                });
            }
            segments.push(original);
            tp.path.segments = syn::punctuated::Punctuated::from_iter(segments);
        }
    }

    let key = type_key(&ty)?;
    let simple_name = match &ty {
        Type::Path(tp) => tp.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    };

    Ok(TypeRef { key, simple_name })
}

pub(crate) fn type_key_from_qualified_ident(module_path: &[String], ident: &str) -> Result<String> {
    let mut s = String::from("crate");
    for m in module_path {
        s.push_str("::");
        s.push_str(m);
    }
    s.push_str("::");
    s.push_str(ident);
    let ty: Type = syn::parse_str(&s)?;
    type_key(&ty)
}

pub(crate) fn reach_of(vis: &syn::Visibility, ctx: &ScanCtx) -> Reach {
    match vis {
        syn::Visibility::Public(_) => Reach::Public,
        syn::Visibility::Restricted(_) => Reach::Restricted,
        syn::Visibility::Inherited if ctx.at_root() => Reach::Restricted,
        syn::Visibility::Inherited => Reach::Hidden,
    }
}

/// 生成代码要把参数放进 `Arc<dyn Any>`，借用、`impl Trait` 与裸 trait 对象都不行。
pub(crate) fn is_owned_value_type(ty: &Type) -> bool {
    match ty {
        Type::Reference(_) | Type::ImplTrait(_) | Type::TraitObject(_) | Type::Infer(_) => false,
        Type::Paren(p) => is_owned_value_type(&p.elem),
        Type::Group(g) => is_owned_value_type(&g.elem),
        Type::Tuple(t) => t.elems.iter().all(is_owned_value_type),
        _ => true,
    }
}
