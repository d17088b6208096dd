use std::sync::Mutex;

use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn new() -> Self {
        Self { saved: Vec::new() }
    }

    fn set(&mut self, key: &str, value: &str) {
        let old = std::env::var(key).ok();
        self.saved.push((key.to_string(), old));
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn unset(&mut self, key: &str) {
        let old = std::env::var(key).ok();
        self.saved.push((key.to_string(), old));
        unsafe {
            std::env::remove_var(key);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, old) in self.saved.drain(..).rev() {
            match old {
                Some(v) => unsafe { std::env::set_var(&k, v) },
                None => unsafe { std::env::remove_var(&k) },
            }
        }
    }
}

struct FakeCrate {
    _tmp: TempDir,
    manifest_dir: std::path::PathBuf,
    out_dir: std::path::PathBuf,
}

impl FakeCrate {
    fn new(lib_rs: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let manifest_dir = tmp.path().join("app");
        let out_dir = tmp.path().join("out");
        std::fs::create_dir_all(manifest_dir.join("src")).unwrap();
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(
            manifest_dir.join("Cargo.toml"),
            r#"[package]
name = "app"
version = "0.1.0"
edition = "2024"
"#,
        )
        .unwrap();
        std::fs::write(manifest_dir.join("src/lib.rs"), lib_rs).unwrap();
        Self {
            _tmp: tmp,
            manifest_dir,
            out_dir,
        }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.manifest_dir.join("src").join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn env(&self) -> EnvGuard {
        let mut env = EnvGuard::new();
        env.set("CARGO_MANIFEST_DIR", self.manifest_dir.to_str().unwrap());
        env.set("OUT_DIR", self.out_dir.to_str().unwrap());
        env.unset("DECOY_EXTRA_MARKERS");
        env
    }

    fn generated(&self) -> String {
        let content = std::fs::read_to_string(self.out_dir.join("decoy_gen.rs")).unwrap();
        syn::parse_file(&content).unwrap();
        content
    }
}

#[test]
fn generate_没有被测类型时输出空注册表() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new("pub struct X;");
    let _env = krate.env();

    decoy_build::generate().unwrap();

    let content = krate.generated();
    assert!(content.contains("pub mod decoy_gen"));
    assert!(content.contains("pub fn register(_registry: &mut ::decoy_rt::Registry)"));
    assert!(content.contains("pub fn injector() -> ::decoy_rt::InjectorBuilder"));
    assert!(!content.contains("TypeInfo::of"));
}

#[test]
fn generate_登记被测类型_构造函数与协作者() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new(
        r#"
use decoy_rt::{contract, inject, subject};
use std::sync::Arc;

pub mod services;

#[subject]
pub struct Calculator {
    #[inject]
    service: Arc<dyn services::MultiplierService>,
    memory: i32,
}

impl Calculator {
    pub fn new() -> Self { todo!() }
    pub fn square(&self, x: i32) -> i32 { x }
}

#[subject]
#[derive(Default)]
pub struct Greeter {
    #[decoy_rt::autowired]
    pub prefix: String,
}

impl Greeter {
    #[inject]
    pub fn with_prefix(prefix: String) -> Self { Self { prefix } }

    #[inject]
    fn set_suffix(&mut self, suffix: String, times: u32) {}
}
"#,
    );
    krate.write(
        "services.rs",
        r#"
#[decoy_rt::contract]
pub trait MultiplierService: Send + Sync {
    fn multiply(&self, a: i32, b: i32) -> i32;
}
"#,
    );
    let _env = krate.env();

    decoy_build::generate().unwrap();

    let content = krate.generated();
    assert!(content.contains(
        r#"FieldDef::new("service", |s: &mut crate::Calculator, v| s.service = v).marked("inject").private()"#
    ));
    assert!(!content.contains(r#"FieldDef::new("memory""#));
    assert!(content.contains(r#"ConstructorDef::of("new", crate::Calculator::new)"#));
    assert!(!content.contains("square"));
    assert!(content.contains(
        r#"FieldDef::new("prefix", |s: &mut crate::Greeter, v| s.prefix = v).marked("autowired")"#
    ));
    assert!(content.contains(
        r#"ConstructorDef::of("with_prefix", crate::Greeter::with_prefix).marked("inject")"#
    ));
    assert!(content.contains(
        r#"MethodDef::of("set_suffix", crate::Greeter::set_suffix).marked("inject").private()"#
    ));
    assert!(content.contains(
        r#"ConstructorDef::of("default", <crate::Greeter as ::core::default::Default>::default)"#
    ));
    assert!(content.contains(
        "registry.register_contract::<dyn crate::services::MultiplierService>();"
    ));
    assert!(content.contains(
        "factory.register_contract::<dyn crate::services::MultiplierService>();"
    ));
    assert!(content.contains(r#"pub const MARKERS: &[&str] = &["inject", "autowired"];"#));
}

#[test]
fn generate_子模块的继承关系与可见性() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new("pub mod model;");
    krate.write(
        "model/mod.rs",
        r#"
#[decoy_rt::subject]
pub struct Base {
    #[inject]
    pub(crate) clock: u64,
}

#[decoy_rt::subject(extends = base)]
pub struct Derived {
    pub base: Base,
    #[resource]
    pub name: String,
}
"#,
    );
    let _env = krate.env();

    decoy_build::generate().unwrap();

    let content = krate.generated();
    assert!(content.contains(
        r#"FieldDef::new("clock", |s: &mut crate::model::Base, v| s.clock = v).marked("inject").private()"#
    ));
    assert!(content.contains(
        r#"FieldDef::new("name", |s: &mut crate::model::Derived, v| s.name = v).marked("resource"))"#
    ));
    assert!(content.contains(".extends(|s: &mut crate::model::Derived| &mut s.base)"));
}

#[test]
fn generate_子模块私有注入字段报错() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new(
        r#"
mod inner {
    #[decoy_rt::subject]
    pub struct Account {
        #[inject]
        ledger: u32,
    }
}
"#,
    );
    let _env = krate.env();

    let err = format!("{:#}", decoy_build::generate().unwrap_err());
    assert!(err.contains("Account::ledger"), "{err}");
    assert!(err.contains("pub(crate)"), "{err}");
}

#[test]
fn generate_cfg_作用域里的被测类型报错() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new(
        r#"
#[cfg(feature = "x")]
#[decoy_rt::subject]
pub struct Gated;
"#,
    );
    let _env = krate.env();

    let err = format!("{:#}", decoy_build::generate().unwrap_err());
    assert!(err.contains("Gated"), "{err}");
    assert!(err.contains("cfg"), "{err}");
}

#[test]
fn generate_注入方法形状不对时报错() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new(
        r#"
#[decoy_rt::subject]
pub struct Job;

impl Job {
    #[inject]
    pub fn set_name(&mut self, name: &str) {}
}
"#,
    );
    let _env = krate.env();

    let err = format!("{:#}", decoy_build::generate().unwrap_err());
    assert!(err.contains("set_name"), "{err}");
    assert!(err.contains("拥有所有权"), "{err}");
}

#[test]
fn generate_额外标记只对方法与构造函数生效() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new(
        r#"
#[decoy_rt::subject]
pub struct Job {
    #[provided]
    pub owner: String,
}

impl Job {
    #[provided]
    pub fn assign(owner: String) -> Self { Self { owner } }
}
"#,
    );
    let mut env = krate.env();
    env.set("DECOY_EXTRA_MARKERS", "provided, ,other");

    decoy_build::generate().unwrap();

    let content = krate.generated();
    assert!(!content.contains(r#"FieldDef::new("owner""#));
    assert!(content.contains(
        r#"ConstructorDef::of("assign", crate::Job::assign).marked("provided")"#
    ));
    assert!(content.contains(r#".marked_with("provided")"#));
}

#[test]
fn generate_同名被测类型的_impl_需要完整路径() {
    let _lock = ENV_LOCK.lock().unwrap();

    let krate = FakeCrate::new(
        r#"
pub mod a {
    #[decoy_rt::subject]
    pub struct Worker;
}
pub mod b {
    #[decoy_rt::subject]
    pub struct Worker;
}
pub mod c {
    impl crate::a::Worker {
        pub fn new() -> Self { Self }
    }
    impl super::b::Worker {
        pub fn other() -> Self { todo!() }
    }
}
"#,
    );
    let _env = krate.env();

    let err = format!("{:#}", decoy_build::generate().unwrap_err());
    assert!(err.contains("多个同名被测类型"), "{err}");
}
