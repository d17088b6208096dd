use proc_macro2::{TokenStream, TokenTree};
use quote::{ToTokens, format_ident, quote};
use syn::{
    Error, FnArg, GenericArgument, ItemTrait, PathArguments, ReturnType, TraitItem, TraitItemFn,
    Type, TypeParamBound,
};

pub(crate) fn expand(item: ItemTrait) -> syn::Result<TokenStream> {
    if !item.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &item.generics,
            "#[contract] 暂不支持泛型 trait",
        ));
    }
    require_send_sync(&item)?;

    let vis = &item.vis;
    let trait_ident = &item.ident;
    let double_ident = format_ident!("{}Double", trait_ident);

    let mut impls = Vec::new();
    let mut defs = Vec::new();
    for trait_item in &item.items {
        match trait_item {
            TraitItem::Fn(f) => {
                let (imp, def) = expand_method(f)?;
                impls.push(imp);
                defs.push(def);
            }
            TraitItem::Type(t) => {
                return Err(Error::new_spanned(t, "#[contract] 不支持关联类型"));
            }
            TraitItem::Const(c) => {
                return Err(Error::new_spanned(c, "#[contract] 不支持关联常量"));
            }
            _ => {}
        }
    }

    let doc = format!("`{trait_ident}` 的可录制替身：未录制的方法返回默认值。");
    Ok(quote! {
        #item

        #[doc = #doc]
        #vis struct #double_ident {
            stubs: ::std::sync::Arc<::decoy_rt::Stubs>,
        }

        impl #double_ident {
            #vis fn new(stubs: ::std::sync::Arc<::decoy_rt::Stubs>) -> Self {
                Self { stubs }
            }

            #vis fn stubs(&self) -> &::std::sync::Arc<::decoy_rt::Stubs> {
                &self.stubs
            }
        }

        impl #trait_ident for #double_ident {
            #(#impls)*
        }

        impl ::decoy_rt::Contract for dyn #trait_ident {
            fn methods() -> ::std::vec::Vec<::decoy_rt::MethodDef> {
                ::std::vec![#(#defs),*]
            }

            fn double(stubs: ::std::sync::Arc<::decoy_rt::Stubs>) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new(#double_ident::new(stubs))
            }
        }
    })
}

fn require_send_sync(item: &ItemTrait) -> syn::Result<()> {
    let has = |name: &str| {
        item.supertraits.iter().any(|bound| match bound {
            TypeParamBound::Trait(t) => t.path.segments.last().is_some_and(|s| s.ident == name),
            _ => false,
        })
    };
    if has("Send") && has("Sync") {
        return Ok(());
    }
    Err(Error::new_spanned(
        &item.ident,
        "#[contract] trait 必须声明 Send + Sync 约束，替身以 Arc<dyn Trait> 注入",
    ))
}

fn expand_method(f: &TraitItemFn) -> syn::Result<(TokenStream, TokenStream)> {
    let sig = &f.sig;
    if !sig.generics.params.is_empty() {
        return Err(Error::new_spanned(sig, "#[contract] 暂不支持泛型方法"));
    }
    if sig.asyncness.is_some() {
        return Err(Error::new_spanned(sig, "#[contract] 不支持 async 方法"));
    }
    let by_ref = sig
        .receiver()
        .is_some_and(|r| r.reference.is_some() && r.colon_token.is_none());
    if !by_ref {
        return Err(Error::new_spanned(
            sig,
            "#[contract] 方法必须以 &self 或 &mut self 为接收者",
        ));
    }

    let name = sig.ident.to_string();
    let mut impl_sig = sig.clone();
    let mut answer_args = Vec::new();
    let mut param_types = Vec::new();
    for (i, arg) in impl_sig.inputs.iter_mut().skip(1).enumerate() {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        if matches!(*pat_type.ty, Type::ImplTrait(_)) {
            return Err(Error::new_spanned(
                &pat_type.ty,
                "#[contract] 不支持 impl Trait 参数",
            ));
        }
        pat_type.attrs.clear();
        // 借用参数不满足 'static，行为表里只按占位匹配
        if matches!(*pat_type.ty, Type::Reference(_)) {
            let ident = format_ident!("_arg{}", i);
            pat_type.pat = Box::new(syn::parse_quote!(#ident));
            answer_args.push(quote!(&()));
            param_types.push(quote!(::decoy_rt::Type::of::<()>()));
        } else {
            if has_nested_borrow(pat_type.ty.to_token_stream()) {
                return Err(Error::new_spanned(
                    &pat_type.ty,
                    "#[contract] 参数只支持顶层的 &T 借用，嵌套的借用请改成拥有所有权的类型",
                ));
            }
            let ident = format_ident!("arg{}", i);
            let ty = &pat_type.ty;
            pat_type.pat = Box::new(syn::parse_quote!(#ident));
            answer_args.push(quote!(&#ident));
            param_types.push(quote!(::decoy_rt::Type::of::<#ty>()));
        }
    }

    let (ret, returns) = match &sig.output {
        ReturnType::Default => (quote!(()), quote!(::decoy_rt::TypeLiteral::of::<()>())),
        ReturnType::Type(_, ty) => {
            let borrowed = has_nested_borrow(ty.to_token_stream());
            if borrowed || matches!(**ty, Type::Reference(_) | Type::ImplTrait(_)) {
                return Err(Error::new_spanned(
                    ty,
                    "#[contract] 方法的返回类型必须是拥有所有权的 Clone + Default 类型",
                ));
            }
            (quote!(#ty), return_literal(ty))
        }
    };

    let imp = quote! {
        #impl_sig {
            self.stubs.answer_or_default::<#ret>(#name, &[#(#answer_args),*])
        }
    };
    let def = quote! {
        ::decoy_rt::MethodDef::new(#name, ::std::vec![#(#param_types),*], #returns)
    };
    Ok((imp, def))
}

/// 类型里是否含有非 `'static` 的借用或生命周期，例如 `Option<&str>`、`Cow<'a, str>`。
fn has_nested_borrow(tokens: TokenStream) -> bool {
    let mut iter = tokens.into_iter().peekable();
    while let Some(tt) = iter.next() {
        match tt {
            TokenTree::Group(g) => {
                if has_nested_borrow(g.stream()) {
                    return true;
                }
            }
            TokenTree::Punct(p) if p.as_char() == '&' => {
                if !starts_lifetime(iter.peek()) {
                    return true;
                }
            }
            TokenTree::Punct(p) if p.as_char() == '\'' => {
                let is_static = matches!(iter.peek(), Some(TokenTree::Ident(i)) if i == "static");
                if !is_static {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn starts_lifetime(tt: Option<&TokenTree>) -> bool {
    matches!(tt, Some(TokenTree::Punct(p)) if p.as_char() == '\'')
}

/// `Vec<i32>` 这类带类型实参的返回类型登记为参数化类型，其余按普通类型登记。
fn return_literal(ty: &Type) -> TokenStream {
    let args: Vec<&Type> = match ty {
        Type::Path(tp) => match tp.path.segments.last().map(|s| &s.arguments) {
            Some(PathArguments::AngleBracketed(angle)) => angle
                .args
                .iter()
                .filter_map(|a| match a {
                    GenericArgument::Type(t) => Some(t),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    if args.is_empty() {
        return quote!(::decoy_rt::TypeLiteral::of::<#ty>());
    }
    quote! {
        ::decoy_rt::TypeLiteral::parameterized::<#ty>([#(::decoy_rt::Type::of::<#args>()),*])
    }
}
