use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use quote::ToTokens;
use syn::{Item, ReturnType, Type};

use crate::{
    model::{
        ContractDef, CtorRaw, FieldRaw, InherentImplRaw, MethodRaw, Reach, ScanCtx, ScanOut,
        SubjectDef, TypeRef, WELL_KNOWN_MARKERS,
    },
    type_util::{is_owned_value_type, reach_of, type_key_from_qualified_ident, type_ref_from_type},
};

/// 构造函数与注入方法最多支持的参数个数，与 decoy-rt 的签名推导一致。
const MAX_PARAMS: usize = 6;

pub(crate) fn scan_crate(
    crate_dir: &Path,
    markers: &[String],
) -> Result<(ScanOut, BTreeSet<PathBuf>)> {
    let src_root = crate_dir.join("src");
    let mut touched_files = BTreeSet::<PathBuf>::new();
    let mut out = ScanOut::default();
    touched_files.insert(crate_dir.join("Cargo.toml"));

    if !src_root.exists() {
        return Ok((out, touched_files));
    }

    let mut rs_files = Vec::new();
    collect_rs_files(&src_root, &mut rs_files)
        .with_context(|| format!("遍历源码目录失败: {}", src_root.display()))?;
    rs_files.sort();

    for path in rs_files {
        touched_files.insert(path.clone());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取源码失败: {}", path.display()))?;
        let module_path = module_path_from_file(&src_root, &path)?;

        let ast = syn::parse_file(&content)
            .with_context(|| format!("解析 Rust AST 失败: {}", path.display()))?;
        let ctx = ScanCtx {
            module_path,
            markers: markers.to_vec(),
        };
        scan_items(&ast.items, &ctx, &mut out, false)?;
    }

    Ok((out, touched_files))
}

fn scan_items(items: &[Item], ctx: &ScanCtx, out: &mut ScanOut, cfg_guarded: bool) -> Result<()> {
    for item in items {
        match item {
            Item::Struct(item_struct) => {
                if cfg_attr_mentions_marker(&item_struct.attrs, "subject") {
                    return Err(anyhow!(
                        "不支持用 #[cfg_attr] 条件启用 #[subject]：decoy-build 不做 cfg 条件裁剪：{}",
                        item_struct.ident
                    ));
                }
                if !has_attr(&item_struct.attrs, "subject") {
                    continue;
                }
                if cfg_guarded || has_cfg_like_attr(&item_struct.attrs) {
                    return Err(anyhow!(
                        "不支持在 cfg/cfg_attr 作用域里声明被测类型：{}（decoy-build 扫描不理解 cfg，可能生成不存在的代码）",
                        item_struct.ident
                    ));
                }
                out.subjects.push(parse_subject(item_struct, ctx)?);
            }
            Item::Trait(item_trait) => {
                if cfg_attr_mentions_marker(&item_trait.attrs, "contract") {
                    return Err(anyhow!(
                        "不支持用 #[cfg_attr] 条件启用 #[contract]：{}",
                        item_trait.ident
                    ));
                }
                if !has_attr(&item_trait.attrs, "contract") {
                    continue;
                }
                if cfg_guarded || has_cfg_like_attr(&item_trait.attrs) {
                    return Err(anyhow!(
                        "不支持在 cfg/cfg_attr 作用域里声明协作者 trait：{}",
                        item_trait.ident
                    ));
                }
                if reach_of(&item_trait.vis, ctx) == Reach::Hidden {
                    return Err(anyhow!(
                        "#[contract] trait 对生成代码不可见：{}（位于子模块时需要声明为 pub 或 pub(crate)）",
                        item_trait.ident
                    ));
                }
                out.contracts.push(ContractDef {
                    trait_key: type_key_from_qualified_ident(
                        &ctx.module_path,
                        &item_trait.ident.to_string(),
                    )?,
                });
            }
            Item::Impl(item_impl) => {
                let self_ty = type_ref_from_type(&item_impl.self_ty, ctx)?;
                let impl_cfg_guarded = cfg_guarded || has_cfg_like_attr(&item_impl.attrs);

                if let Some((_, trait_path, _)) = &item_impl.trait_ {
                    let is_default = trait_path
                        .segments
                        .last()
                        .is_some_and(|s| s.ident == "Default");
                    if is_default && !impl_cfg_guarded {
                        out.default_impls.push(self_ty);
                    }
                    continue;
                }
                if !item_impl.generics.params.is_empty() {
                    continue;
                }
                let raw = scan_inherent_impl(item_impl, self_ty, ctx, impl_cfg_guarded)?;
                if !raw.methods.is_empty() || !raw.ctors.is_empty() {
                    out.impls.push(raw);
                }
            }
            Item::Mod(item_mod) => {
                let Some((_, inline_items)) = &item_mod.content else {
                    continue;
                };
                let mut next = ctx.clone();
                next.module_path.push(item_mod.ident.to_string());
                let next_cfg_guarded = cfg_guarded || has_cfg_like_attr(&item_mod.attrs);
                scan_items(inline_items, &next, out, next_cfg_guarded)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_subject(item_struct: &syn::ItemStruct, ctx: &ScanCtx) -> Result<SubjectDef> {
    let struct_name = item_struct.ident.to_string();
    if !item_struct.generics.params.is_empty() {
        return Err(anyhow!("暂不支持泛型被测类型：{struct_name}"));
    }
    if reach_of(&item_struct.vis, ctx) == Reach::Hidden {
        return Err(anyhow!(
            "被测类型对生成代码不可见：{struct_name}（位于子模块时需要声明为 pub 或 pub(crate)）"
        ));
    }
    let extends = parse_subject_args(&item_struct.attrs)?;

    let mut fields = Vec::new();
    if let syn::Fields::Named(named) = &item_struct.fields {
        for field in &named.named {
            let Some(ident) = field.ident.as_ref() else {
                continue;
            };
            let name = ident.to_string();
            // #[subject] 只会去掉默认标记，字段上的额外标记留在源码里也无法编译
            let mut markers = markers_of(&field.attrs, ctx);
            markers.retain(|m| WELL_KNOWN_MARKERS.contains(&m.as_str()));
            let reach = reach_of(&field.vis, ctx);
            let is_base = extends.as_deref() == Some(name.as_str());
            if (!markers.is_empty() || is_base) && reach == Reach::Hidden {
                return Err(anyhow!(
                    "字段 {struct_name}::{name} 对生成代码不可见：位于子模块的被测类型，注入字段与 extends 字段需要声明为 pub 或 pub(crate)"
                ));
            }
            fields.push(FieldRaw {
                name,
                markers,
                reach,
            });
        }
    }

    if let Some(base) = extends.as_deref() {
        if !fields.iter().any(|f| f.name == base) {
            return Err(anyhow!(
                "#[subject(extends = {base})] 指向的字段不存在：{struct_name}"
            ));
        }
    }

    Ok(SubjectDef {
        type_key: type_key_from_qualified_ident(&ctx.module_path, &struct_name)?,
        struct_name,
        fields,
        extends,
        derives_default: derives(&item_struct.attrs, "Default"),
    })
}

fn parse_subject_args(attrs: &[syn::Attribute]) -> Result<Option<String>> {
    let mut seen = false;
    let mut out = None;

    for attr in attrs {
        let is_subject = attr
            .path()
            .segments
            .last()
            .is_some_and(|s| s.ident == "subject");
        if !is_subject {
            continue;
        }
        if seen {
            return Err(anyhow!("同一个结构体上不允许重复标记 #[subject]"));
        }
        seen = true;

        match &attr.meta {
            syn::Meta::Path(_) => {}
            syn::Meta::NameValue(_) => {
                return Err(anyhow!(
                    "#[subject] 不支持 name-value 形式，请使用 #[subject] 或 #[subject(extends = 字段名)]"
                ));
            }
            syn::Meta::List(_) => {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("extends") {
                        if out.is_some() {
                            return Err(meta.error("重复指定 extends"));
                        }
                        let field: syn::Ident = meta.value()?.parse()?;
                        out = Some(field.to_string());
                        return Ok(());
                    }
                    Err(meta.error("未知的参数：只支持 extends = 字段名"))
                })?;
            }
        }
    }

    Ok(out)
}

fn scan_inherent_impl(
    item_impl: &syn::ItemImpl,
    self_ty: TypeRef,
    ctx: &ScanCtx,
    impl_cfg_guarded: bool,
) -> Result<InherentImplRaw> {
    let mut methods = Vec::new();
    let mut ctors = Vec::new();

    for impl_item in &item_impl.items {
        let syn::ImplItem::Fn(impl_fn) = impl_item else {
            continue;
        };
        let fn_name = &impl_fn.sig.ident;
        let markers = markers_of(&impl_fn.attrs, ctx);
        let marked = !markers.is_empty();
        let cfg_guarded = impl_cfg_guarded || has_cfg_like_attr(&impl_fn.attrs);

        if marked && cfg_guarded {
            return Err(anyhow!(
                "不支持在 cfg/cfg_attr 作用域里声明注入点：{}::{fn_name}（decoy-build 扫描不理解 cfg，可能生成不存在的代码）",
                self_ty.key
            ));
        }
        if cfg_guarded {
            continue;
        }

        let reach = reach_of(&impl_fn.vis, ctx);
        if impl_fn.sig.receiver().is_some() {
            if !marked {
                continue;
            }
            check_injection_method(impl_fn, &self_ty, reach)?;
            methods.push(MethodRaw {
                name: fn_name.to_string(),
                markers,
                reach,
            });
            continue;
        }

        let arity = impl_fn.sig.inputs.len();
        if !marked && (arity > 0 || reach == Reach::Hidden) {
            continue;
        }
        if !returns_self(&impl_fn.sig.output, &self_ty, ctx)? {
            if marked {
                return Err(anyhow!(
                    "带注入标记的构造函数必须返回 Self（或当前类型）：{}::{fn_name}",
                    self_ty.key
                ));
            }
            continue;
        }
        if !impl_fn.sig.generics.params.is_empty() || impl_fn.sig.asyncness.is_some() {
            if marked {
                return Err(anyhow!(
                    "暂不支持泛型或 async 构造函数：{}::{fn_name}",
                    self_ty.key
                ));
            }
            continue;
        }
        if marked {
            check_injection_params(impl_fn, &self_ty, reach)?;
        }
        ctors.push(CtorRaw {
            name: fn_name.to_string(),
            markers,
            reach,
            arity,
        });
    }

    Ok(InherentImplRaw {
        self_ty,
        methods,
        ctors,
    })
}

fn check_injection_method(
    impl_fn: &syn::ImplItemFn,
    self_ty: &TypeRef,
    reach: Reach,
) -> Result<()> {
    let sig = &impl_fn.sig;
    let mut_ref_receiver = sig.receiver().is_some_and(|r| {
        r.reference.is_some() && r.mutability.is_some() && r.colon_token.is_none()
    });
    let returns_unit = match &sig.output {
        ReturnType::Default => true,
        ReturnType::Type(_, ty) => matches!(&**ty, Type::Tuple(t) if t.elems.is_empty()),
    };
    if !mut_ref_receiver || !returns_unit {
        return Err(anyhow!(
            "注入方法必须形如 fn(&mut self, ..) 且没有返回值：{}::{}",
            self_ty.key,
            sig.ident
        ));
    }
    if !sig.generics.params.is_empty() || sig.asyncness.is_some() {
        return Err(anyhow!(
            "暂不支持泛型或 async 注入方法：{}::{}",
            self_ty.key,
            sig.ident
        ));
    }
    check_injection_params(impl_fn, self_ty, reach)
}

fn check_injection_params(
    impl_fn: &syn::ImplItemFn,
    self_ty: &TypeRef,
    reach: Reach,
) -> Result<()> {
    let sig = &impl_fn.sig;
    if reach == Reach::Hidden {
        return Err(anyhow!(
            "注入点对生成代码不可见：{}::{}（位于子模块时需要声明为 pub 或 pub(crate)）",
            self_ty.key,
            sig.ident
        ));
    }
    let mut count = 0;
    for arg in &sig.inputs {
        let syn::FnArg::Typed(pat_type) = arg else {
            continue;
        };
        count += 1;
        if !is_owned_value_type(&pat_type.ty) {
            return Err(anyhow!(
                "注入参数必须是拥有所有权的类型（不支持借用与 impl Trait）：{}::{} 的参数 {}",
                self_ty.key,
                sig.ident,
                pat_type.ty.to_token_stream()
            ));
        }
    }
    if count > MAX_PARAMS {
        return Err(anyhow!(
            "注入点最多支持 {MAX_PARAMS} 个参数：{}::{}",
            self_ty.key,
            sig.ident
        ));
    }
    Ok(())
}

fn returns_self(output: &ReturnType, self_ty: &TypeRef, ctx: &ScanCtx) -> Result<bool> {
    let ReturnType::Type(_, return_ty) = output else {
        return Ok(false);
    };

    if let Type::Path(tp) = &**return_ty {
        if tp.qself.is_none()
            && tp.path.leading_colon.is_none()
            && tp.path.segments.len() == 1
            && tp.path.segments[0].ident == "Self"
        {
            return Ok(true);
        }
    }

    let return_ref = type_ref_from_type(return_ty, ctx)?;
    Ok(return_ref.key == self_ty.key)
}

fn markers_of(attrs: &[syn::Attribute], ctx: &ScanCtx) -> Vec<String> {
    let mut out = Vec::new();
    for attr in attrs {
        let Some(last) = attr.path().segments.last().map(|s| s.ident.to_string()) else {
            continue;
        };
        if ctx.markers.iter().any(|m| *m == last) && !out.contains(&last) {
            out.push(last);
        }
    }
    out
}

fn has_attr(attrs: &[syn::Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| {
        let last = attr.path().segments.last().map(|s| s.ident.to_string());
        matches!(last.as_deref(), Some(n) if n == name)
    })
}

fn has_cfg_like_attr(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        let last = attr.path().segments.last().map(|s| s.ident.to_string());
        matches!(last.as_deref(), Some("cfg") | Some("cfg_attr"))
    })
}

fn cfg_attr_mentions_marker(attrs: &[syn::Attribute], marker: &str) -> bool {
    attrs.iter().any(|attr| {
        let last = attr.path().segments.last().map(|s| s.ident.to_string());
        if last.as_deref() != Some("cfg_attr") {
            return false;
        }
        attr.to_token_stream().to_string().contains(marker)
    })
}

fn derives(attrs: &[syn::Attribute], name: &str) -> bool {
    let mut found = false;
    for attr in attrs {
        if !attr.path().is_ident("derive") {
            continue;
        }
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.segments.last().is_some_and(|s| s.ident == name) {
                found = true;
            }
            Ok(())
        });
    }
    found
}

fn collect_rs_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let ty = entry.file_type()?;
        let path = entry.path();
        if ty.is_dir() {
            collect_rs_files(&path, out)?;
            continue;
        }
        if ty.is_file() && path.extension().and_then(|e| e.to_str()) == Some("rs") {
            out.push(path);
        }
    }
    Ok(())
}

fn module_path_from_file(src_root: &Path, file: &Path) -> Result<Vec<String>> {
    let rel = file
        .strip_prefix(src_root)
        .with_context(|| format!("计算相对路径失败: {}", file.display()))?;

    let mut parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    if parts.is_empty() {
        return Ok(Vec::new());
    }

    let file_name = parts.pop().ok_or_else(|| anyhow!("空文件名"))?;
    let file_stem = file_name.strip_suffix(".rs").unwrap_or(&file_name);
    match file_stem {
        "lib" | "main" | "mod" => {}
        other => parts.push(other.to_string()),
    }
    Ok(parts)
}
