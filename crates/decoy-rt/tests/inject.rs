mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::*;
use decoy_rt::{
    InjectError, Injector, Member, MemberKind, Registry, StubFactory, Stubs, TestHandle, Type,
    supplied,
};

fn multiplier_double(name: Option<&str>) -> (decoy_rt::DoubleDescriptor, Arc<Stubs>) {
    let stubs = Arc::new(Stubs::new());
    let service: Arc<dyn MultiplierService> = Arc::new(MultiplierDouble(stubs.clone()));
    let builder = supplied(service).with_stubs(stubs.clone());
    let descriptor = match name {
        Some(name) => builder.named(name).build(),
        None => builder.build(),
    };
    (descriptor, stubs)
}

#[test]
fn 录制返回值后_square_得到录制的值() {
    let injector = injector();
    let calculator: Calculator = injector.instance_for_testing(&[]).unwrap();

    let recorded = decoy_rt::given::<i32>()
        .unwrap()
        .is_requested()
        .then_return(4)
        .unwrap();
    assert_eq!(recorded, 1);
    assert_eq!(calculator.square(2), 4);
    assert_eq!(calculator.square(9), 4);
    decoy_rt::clear();
}

#[test]
fn 未录制时替身返回默认值() {
    let injector = injector();
    let calculator = injector
        .instantiate_and_inject::<Calculator>(&[])
        .unwrap()
        .into_instance();
    assert_eq!(calculator.square(3), 0);
}

#[test]
fn 提供的替身按类型注入并可通过上下文录制() {
    let injector = injector();
    let (service, stubs) = multiplier_double(None);
    let result = injector
        .instantiate_and_inject::<Calculator>(&[service.clone()])
        .unwrap();

    assert_eq!(result.used(), &[service]);
    result
        .context()
        .given::<i32>()
        .is_requested()
        .then_return(12)
        .unwrap();
    assert_eq!(result.instance().square(5), 12);
    assert_eq!(stubs.invocations("multiply"), 1);
}

#[test]
fn 构造函数参数_没有提供时现造一个默认字符串() {
    let injector = injector();
    let result = injector.instantiate_and_inject::<Greeter>(&[]).unwrap();

    assert_eq!(result.instance().name, "");
    let used = result.used();
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].declared_type(), Type::of::<String>());
    assert_eq!(used[0].name(), None);
}

#[test]
fn 构造函数参数_使用提供的同类型替身() {
    let injector = injector();
    let name = supplied(String::from("Ada")).build();
    let greeter: Greeter = injector.instance_for_testing(&[name]).unwrap();
    assert_eq!(greeter.name, "Ada");
    decoy_rt::clear();
}

#[test]
fn 同名同类型的替身精确落到对应字段() {
    let injector = injector();
    let (service, stubs) = multiplier_double(Some("service"));
    let name = supplied(String::from("tom")).named("name").build();
    let decoy = supplied(String::from("other")).named("alias").build();

    let result = injector
        .instantiate_and_inject::<Labeled>(&[decoy, name.clone(), service.clone()])
        .unwrap();
    assert_eq!(result.instance().name, "tom");
    assert_eq!(result.used(), &[service, name]);

    stubs.stub(
        "multiply",
        vec![decoy_rt::ArgMatcher::Any, decoy_rt::ArgMatcher::Any],
        Arc::new(81i32),
    );
    assert_eq!(result.instance().square(9), 81);
}

#[test]
fn 名字匹配但类型不符时按类型找() {
    let injector = injector();
    // 名为 name 的 u32 不能放进 String 字段
    let wrong = supplied(5u32).named("name").build();
    let by_type = supplied(String::from("by type")).build();
    let result = injector
        .instantiate_and_inject::<Labeled>(&[wrong, by_type.clone()])
        .unwrap();
    assert_eq!(result.instance().name, "by type");
    assert!(result.used().contains(&by_type));
}

#[test]
fn setter_与多参数方法注入() {
    let injector = injector();
    let retries = supplied(3u32).named("retries").build();
    let label = supplied(String::from("primary")).build();
    let result = injector
        .instantiate_and_inject::<Settings>(&[label.clone(), retries.clone()])
        .unwrap();

    let settings = result.instance();
    assert_eq!(settings.label, "primary");
    assert_eq!(settings.retries, 3);
    assert_eq!(settings.pair, (3, "primary".to_string()));
    // 同一个替身注入多处只记一次
    assert_eq!(result.used(), &[label, retries]);
}

#[test]
fn setter_前缀可配置() {
    let injector = Injector::builder(Arc::new(registry()), Arc::new(factory()))
        .marked_with("inject")
        .setter_prefix("assign_")
        .build()
        .unwrap();
    let named = supplied(7u32).named("retries").build();
    let other = supplied(1u32).build();
    let settings = injector
        .instantiate_and_inject::<Settings>(&[other, named])
        .unwrap()
        .into_instance();
    // set_retries 不再被当作 setter，只能按类型拿到第一个 u32
    assert_eq!(settings.retries, 1);
}

#[test]
fn setter_前缀为空时构建失败() {
    let err = Injector::builder(Arc::new(registry()), Arc::new(factory()))
        .marked_with("inject")
        .setter_prefix("")
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, InjectError::EmptySetterPrefix));
}

#[test]
fn 多个可注入构造函数时报歧义() {
    let injector = injector();
    let err = injector
        .instantiate_and_inject::<Audited>(&[])
        .err()
        .unwrap();
    assert!(matches!(err, InjectError::AmbiguousConstructors { .. }));
    assert!(err.to_string().contains("Audited"), "{err}");
    // 报错发生在任何构造函数被调用之前
    assert_eq!(AUDITED_BUILT.load(Ordering::SeqCst), 0);
}

#[test]
fn 排除构造函数后没有可用构造函数() {
    let injector = Injector::builder(Arc::new(registry()), Arc::new(factory()))
        .marked_with("inject")
        .excluding(MemberKind::Constructor)
        .build()
        .unwrap();
    let err = injector
        .instantiate_and_inject::<Greeter>(&[])
        .err()
        .unwrap();
    assert!(matches!(err, InjectError::NoUsableConstructor { .. }));
    assert!(err.to_string().contains("Greeter"), "{err}");
}

#[test]
fn 无法现造替身时报错_带槽位与类型() {
    let injector = injector();
    let err = injector
        .instantiate_and_inject::<NeedsUnknown>(&[])
        .err()
        .unwrap();
    let msg = err.to_string();
    assert!(msg.contains("unknown"), "{msg}");
    assert!(msg.contains("Unknown"), "{msg}");
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains("没有为类型"), "{source}");
}

#[test]
fn 注入方法报错时整次注入失败() {
    let injector = injector();
    let err = injector
        .instantiate_and_inject::<Failing>(&[])
        .err()
        .unwrap();
    match &err {
        InjectError::Injection { member, .. } => assert_eq!(member, "explode"),
        other => panic!("unexpected error: {other}"),
    }
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains("limit exceeded"), "{source}");
}

#[test]
fn 继承来的字段也会注入() {
    let injector = injector();
    let name = supplied(String::from("base name")).named("name").build();
    let size = supplied(42u32).build();
    let derived = injector
        .instantiate_and_inject::<Derived>(&[name, size])
        .unwrap()
        .into_instance();
    assert_eq!(derived.base.name, "base name");
    assert_eq!(derived.size, 42);
}

#[test]
fn 自动探测标记() {
    let injector = Injector::builder(Arc::new(registry()), Arc::new(factory()))
        .build()
        .unwrap();
    let result = injector.instantiate_and_inject::<Calculator>(&[]);
    assert_eq!(result.unwrap().used().len(), 1);
}

#[test]
fn 自动探测失败时列出尝试过的标记() {
    let err = Injector::builder(Arc::new(Registry::new()), Arc::new(StubFactory::new()))
        .build()
        .err()
        .unwrap();
    let msg = err.to_string();
    for marker in decoy_rt::WELL_KNOWN_MARKERS {
        assert!(msg.contains(marker), "{msg}");
    }
}

#[test]
fn 自定义注入点策略() {
    let only_fields = |member: Member<'_>| member.kind() == MemberKind::Field;
    let injector = Injector::builder(Arc::new(registry()), Arc::new(factory()))
        .with_injection_point(only_fields)
        .build()
        .unwrap();
    let settings = injector
        .instantiate_and_inject::<Settings>(&[supplied(9u32).build()])
        .unwrap()
        .into_instance();
    assert_eq!(settings.retries, 0);
    assert_eq!(settings.label, "");
}

#[test]
fn 未注入前录制报未初始化() {
    std::thread::spawn(|| {
        let err = decoy_rt::given::<i32>().err().unwrap();
        assert!(matches!(err, InjectError::NotInitialized));
    })
    .join()
    .unwrap();
}

#[test]
fn 句柄登记的上下文与线程无关() {
    let injector = injector();
    let handle = TestHandle::new();
    let calculator: Calculator = injector.instance_for_handle(&handle, &[]).unwrap();

    let worker = handle.clone();
    std::thread::spawn(move || {
        worker
            .given::<i32>()
            .unwrap()
            .is_requested()
            .then_return(16)
            .unwrap();
    })
    .join()
    .unwrap();
    assert_eq!(calculator.square(4), 16);
}

#[test]
fn 录制值类型与请求类型不一致时报错() {
    let injector = injector();
    let result = injector.instantiate_and_inject::<Calculator>(&[]).unwrap();
    let err = result
        .context()
        .given_literal::<i64>(decoy_rt::TypeLiteral::of::<i32>())
        .is_requested()
        .then_return(1)
        .err()
        .unwrap();
    assert!(matches!(err, InjectError::ReturnTypeMismatch { .. }));
}
