#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use decoy_rt::{
    AccessError, Args, ConstructorDef, FieldDef, Injector, MethodDef, Registry, StubFactory,
    Stubs, Type, TypeInfo,
};

pub trait MultiplierService: Send + Sync {
    fn multiply(&self, a: i32, b: i32) -> i32;
}

pub struct MultiplierDouble(pub Arc<Stubs>);

impl MultiplierService for MultiplierDouble {
    fn multiply(&self, a: i32, b: i32) -> i32 {
        self.0.answer_or_default("multiply", &[&a, &b])
    }
}

pub struct RealMultiplier;

impl MultiplierService for RealMultiplier {
    fn multiply(&self, a: i32, b: i32) -> i32 {
        a * b
    }
}

pub struct Calculator {
    service: Arc<dyn MultiplierService>,
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            service: Arc::new(RealMultiplier),
        }
    }

    pub fn square(&self, x: i32) -> i32 {
        self.service.multiply(x, x)
    }
}

pub struct Greeter {
    pub name: String,
}

impl Greeter {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

pub struct Labeled {
    pub service: Arc<dyn MultiplierService>,
    pub name: String,
}

impl Labeled {
    pub fn square(&self, x: i32) -> i32 {
        self.service.multiply(x, x)
    }
}

#[derive(Default)]
pub struct Settings {
    pub label: String,
    pub retries: u32,
    pub pair: (u32, String),
}

impl Settings {
    pub fn configure(&mut self, retries: u32, label: String) {
        self.pair = (retries, label);
    }
}

pub struct Audited {
    pub id: u64,
}

/// Audited 的构造函数被调用的次数。
pub static AUDITED_BUILT: AtomicUsize = AtomicUsize::new(0);

pub struct Unknown;

pub struct NeedsUnknown {
    pub unknown: Arc<Unknown>,
}

#[derive(Default)]
pub struct Base {
    pub name: String,
}

#[derive(Default)]
pub struct Derived {
    pub base: Base,
    pub size: u32,
}

pub struct Failing;

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(TypeInfo::of::<Arc<dyn MultiplierService>>().method(MethodDef::new(
            "multiply",
            vec![Type::of::<i32>(), Type::of::<i32>()],
            Type::of::<i32>(),
        )))
        .register(
            TypeInfo::of::<Calculator>()
                .field(
                    FieldDef::new("service", |c: &mut Calculator, v| c.service = v)
                        .marked("inject")
                        .private(),
                )
                .constructor(ConstructorDef::no_arg("new", Calculator::new)),
        )
        .register(TypeInfo::of::<Greeter>().constructor(
            ConstructorDef::new("new", vec![Type::of::<String>()], |args: &Args| {
                Ok(Greeter::new(args.take(0)?))
            })
            .marked("inject"),
        ))
        .register(
            TypeInfo::of::<Labeled>()
                .field(FieldDef::new("service", |l: &mut Labeled, v| l.service = v).marked("inject"))
                .field(
                    FieldDef::new("name", |l: &mut Labeled, v: String| l.name = v).marked("inject"),
                )
                .constructor(ConstructorDef::no_arg("new", || Labeled {
                    service: Arc::new(RealMultiplier),
                    name: String::new(),
                })),
        )
        .register(
            TypeInfo::of::<Settings>()
                .field(
                    FieldDef::new("label", |s: &mut Settings, v: String| s.label = v)
                        .marked("inject"),
                )
                .method(
                    MethodDef::setter("set_retries", |s: &mut Settings, v: u32| s.retries = v)
                        .marked("inject")
                        .private(),
                )
                .method(
                    MethodDef::new(
                        "configure",
                        vec![Type::of::<u32>(), Type::of::<String>()],
                        Type::of::<()>(),
                    )
                    .invoker(|s: &mut Settings, args: &Args| {
                        s.configure(args.take(0)?, args.take(1)?);
                        Ok(())
                    })
                    .marked("inject"),
                )
                .constructor(ConstructorDef::no_arg("new", Settings::default)),
        )
        .register(
            TypeInfo::of::<Audited>()
                .constructor(
                    ConstructorDef::new("with_id", vec![Type::of::<u64>()], |args: &Args| {
                        AUDITED_BUILT.fetch_add(1, Ordering::SeqCst);
                        Ok(Audited { id: args.take(0)? })
                    })
                    .marked("inject"),
                )
                .constructor(
                    ConstructorDef::new("from_name", vec![Type::of::<String>()], |args: &Args| {
                        AUDITED_BUILT.fetch_add(1, Ordering::SeqCst);
                        Ok(Audited {
                            id: args.take::<String>(0)?.len() as u64,
                        })
                    })
                    .marked("inject"),
                ),
        )
        .register(
            TypeInfo::of::<NeedsUnknown>()
                .field(
                    FieldDef::new("unknown", |n: &mut NeedsUnknown, v| n.unknown = v)
                        .marked("inject"),
                )
                .constructor(ConstructorDef::no_arg("new", || NeedsUnknown {
                    unknown: Arc::new(Unknown),
                })),
        )
        .register(
            TypeInfo::of::<Base>()
                .field(
                    FieldDef::new("name", |b: &mut Base, v: String| b.name = v).marked("inject"),
                )
                .constructor(ConstructorDef::no_arg("new", Base::default)),
        )
        .register(
            TypeInfo::of::<Derived>()
                .field(FieldDef::new("size", |d: &mut Derived, v: u32| d.size = v).marked("inject"))
                .constructor(ConstructorDef::no_arg("new", Derived::default))
                .extends(|d: &mut Derived| &mut d.base),
        )
        .register(
            TypeInfo::of::<Failing>()
                .method(
                    MethodDef::setter("set_limit", |_: &mut Failing, _: u32| {})
                        .marked("inject"),
                )
                .method(
                    MethodDef::new("explode", vec![Type::of::<u8>()], Type::of::<()>())
                        .invoker(|_: &mut Failing, _: &Args| {
                            Err(AccessError::raised("limit exceeded"))
                        })
                        .marked("inject"),
                )
                .constructor(ConstructorDef::no_arg("new", || Failing)),
        );
    registry
}

pub fn factory() -> StubFactory {
    let mut factory = StubFactory::new();
    factory.register::<Arc<dyn MultiplierService>, _>(|stubs| {
        Arc::new(MultiplierDouble(stubs)) as Arc<dyn MultiplierService>
    });
    factory
}

pub fn injector() -> Injector {
    Injector::builder(Arc::new(registry()), Arc::new(factory()))
        .marked_with("inject")
        .build()
        .unwrap()
}
