use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};

use crate::model::{ContractDef, Reach, Subject};

struct RustWriter {
    buf: String,
    indent: usize,
}

impl RustWriter {
    fn new() -> Self {
        Self {
            buf: String::new(),
            indent: 0,
        }
    }

    fn finish(self) -> String {
        self.buf
    }

    fn blank_line(&mut self) {
        self.buf.push('\n');
    }

    fn line(&mut self, s: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(s.as_ref());
        self.buf.push('\n');
    }

    fn block(
        &mut self,
        header: impl AsRef<str>,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.line(format!("{} {{", header.as_ref()));
        self.indent += 1;
        f(self)?;
        self.indent -= 1;
        self.line("}");
        Ok(())
    }
}

/// 类型 key 是 token 流的字符串形式（`crate :: m :: X`），生成代码里直接原样使用。
fn path_of(key: &str) -> String {
    key.replace(' ', "")
}

fn member_suffix(markers: &[String], reach: Reach) -> String {
    let mut out = String::new();
    for m in markers {
        out.push_str(&format!(".marked({m:?})"));
    }
    if reach != Reach::Public {
        out.push_str(".private()");
    }
    out
}

fn subject_registration(w: &mut RustWriter, subject: &Subject) -> Result<()> {
    let ty = path_of(&subject.type_key);
    w.line("registry.register(");
    w.indent += 1;
    w.line(format!("::decoy_rt::TypeInfo::of::<{ty}>()"));
    w.indent += 1;

    for field in subject.fields.iter().filter(|f| !f.markers.is_empty()) {
        w.line(format!(
            ".field(::decoy_rt::FieldDef::new({name:?}, |s: &mut {ty}, v| s.{name} = v){suffix})",
            name = field.name,
            suffix = member_suffix(&field.markers, field.reach),
        ));
    }
    for method in &subject.methods {
        w.line(format!(
            ".method(::decoy_rt::MethodDef::of({name:?}, {ty}::{name}){suffix})",
            name = method.name,
            suffix = member_suffix(&method.markers, method.reach),
        ));
    }
    for ctor in &subject.ctors {
        w.line(format!(
            ".constructor(::decoy_rt::ConstructorDef::of({name:?}, {ty}::{name}){suffix})",
            name = ctor.name,
            suffix = member_suffix(&ctor.markers, ctor.reach),
        ));
    }
    if subject.needs_default_ctor() {
        let default = format!("<{ty} as ::core::default::Default>::default");
        w.line(format!(
            ".constructor(::decoy_rt::ConstructorDef::of(\"default\", {default}))"
        ));
    }
    if let Some(base) = subject.extends.as_deref() {
        w.line(format!(".extends(|s: &mut {ty}| &mut s.{base})"));
    }

    w.indent -= 2;
    w.line(");");
    Ok(())
}

fn collect_markers(subjects: &BTreeMap<String, Subject>) -> Vec<String> {
    let mut out = Vec::<String>::new();
    let mut push = |markers: &[String]| {
        for m in markers {
            if !out.contains(m) {
                out.push(m.clone());
            }
        }
    };
    for s in subjects.values() {
        for f in &s.fields {
            push(&f.markers);
        }
        for m in &s.methods {
            push(&m.markers);
        }
        for c in &s.ctors {
            push(&c.markers);
        }
    }
    out
}

pub(crate) fn generate_code(
    subjects: &BTreeMap<String, Subject>,
    contracts: &[ContractDef],
) -> Result<String> {
    let mut seen = BTreeSet::<&str>::new();
    for c in contracts {
        if !seen.insert(c.trait_key.as_str()) {
            return Err(anyhow!("协作者 trait 重复：{}", c.trait_key));
        }
    }

    let markers = collect_markers(subjects);

    let mut w = RustWriter::new();
    w.line("// @generated by decoy-build，请勿手动修改。");
    w.blank_line();
    w.line("#[allow(dead_code, clippy::all)]");
    w.block("pub mod decoy_gen", |w| {
        let list = markers
            .iter()
            .map(|m| format!("{m:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        w.line("/// 源码中实际出现的注入标记。");
        w.line(format!("pub const MARKERS: &[&str] = &[{list}];"));
        w.blank_line();

        let registry_arg = if subjects.is_empty() && contracts.is_empty() {
            "_registry"
        } else {
            "registry"
        };
        w.block(
            format!("pub fn register({registry_arg}: &mut ::decoy_rt::Registry)"),
            |w| {
                for subject in subjects.values() {
                    subject_registration(w, subject)?;
                }
                for c in contracts {
                    w.line(format!(
                        "registry.register_contract::<dyn {}>();",
                        path_of(&c.trait_key)
                    ));
                }
                Ok(())
            },
        )?;
        w.blank_line();

        w.block("pub fn registry() -> ::decoy_rt::Registry", |w| {
            w.line("let mut registry = ::decoy_rt::Registry::new();");
            w.line("register(&mut registry);");
            w.line("registry");
            Ok(())
        })?;
        w.blank_line();

        let factory_arg = if contracts.is_empty() {
            "_factory"
        } else {
            "factory"
        };
        w.block(
            format!("pub fn register_doubles({factory_arg}: &mut ::decoy_rt::StubFactory)"),
            |w| {
                for c in contracts {
                    w.line(format!(
                        "factory.register_contract::<dyn {}>();",
                        path_of(&c.trait_key)
                    ));
                }
                Ok(())
            },
        )?;
        w.blank_line();

        w.block("pub fn factory() -> ::decoy_rt::StubFactory", |w| {
            w.line("let mut factory = ::decoy_rt::StubFactory::new();");
            w.line("register_doubles(&mut factory);");
            w.line("factory");
            Ok(())
        })?;
        w.blank_line();

        w.line("/// 按扫描到的标记配置好的注入器构建器。");
        w.block("pub fn injector() -> ::decoy_rt::InjectorBuilder", |w| {
            w.line("let builder = ::decoy_rt::Injector::builder(");
            w.indent += 1;
            w.line("::std::sync::Arc::new(registry()),");
            w.line("::std::sync::Arc::new(factory()),");
            w.indent -= 1;
            w.line(");");
            w.line("builder");
            w.indent += 1;
            for m in &markers {
                w.line(format!(".marked_with({m:?})"));
            }
            w.indent -= 1;
            Ok(())
        })
    })?;

    Ok(w.finish())
}

pub(crate) fn minimal_generated_code() -> Result<String> {
    generate_code(&BTreeMap::new(), &[])
}
