use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::stubs::Stubs;
use crate::types::Type;

/// 类型擦除后的可注入值，内部就是槽位声明类型的值本身。
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 一个替身：注入用的值，加上（可录制时）它的行为表。
#[derive(Clone)]
pub struct Double {
    value: Instance,
    stubs: Option<Arc<Stubs>>,
}

impl Double {
    /// 普通值，可以注入，但不能录制行为。
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            stubs: None,
        }
    }

    pub fn stubbed<T: Any + Send + Sync>(value: T, stubs: Arc<Stubs>) -> Self {
        Self {
            value: Arc::new(value),
            stubs: Some(stubs),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.value
    }

    pub fn stubs(&self) -> Option<&Arc<Stubs>> {
        self.stubs.as_ref()
    }

    pub fn is_stubbable(&self) -> bool {
        self.stubs.is_some()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Double")
            .field("stubbable", &self.is_stubbable())
            .finish_non_exhaustive()
    }
}

struct DescriptorInner {
    double: Double,
    name: Option<String>,
    declared_type: Type,
}

/// 替身描述：替身、可选名字、声明类型。
///
/// 克隆共享同一份数据；相等与哈希按身份（同一次创建）判断，
/// 两个内容相同但分别创建的描述互不相等。
#[derive(Clone)]
pub struct DoubleDescriptor(Arc<DescriptorInner>);

impl DoubleDescriptor {
    pub fn new(double: Double, name: Option<String>, declared_type: Type) -> Self {
        Self(Arc::new(DescriptorInner {
            double,
            name,
            declared_type,
        }))
    }

    pub fn builder<T: Any + Send + Sync>(value: T) -> DescriptorBuilder<T> {
        supplied(value)
    }

    pub fn double(&self) -> &Double {
        &self.0.double
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn declared_type(&self) -> Type {
        self.0.declared_type
    }

    pub fn same_as(&self, other: &DoubleDescriptor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for DoubleDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for DoubleDescriptor {}

impl Hash for DoubleDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Display for DoubleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "替身: 类型 [{}]", self.declared_type())?;
        match self.name() {
            Some(name) => write!(f, " 名为 [{name}]"),
            None => f.write_str(" 未命名"),
        }
    }
}

impl fmt::Debug for DoubleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub struct DescriptorBuilder<T> {
    value: T,
    name: Option<String>,
    stubs: Option<Arc<Stubs>>,
}

/// `supplied(value).named("service").build()`
pub fn supplied<T: Any + Send + Sync>(value: T) -> DescriptorBuilder<T> {
    DescriptorBuilder {
        value,
        name: None,
        stubs: None,
    }
}

impl<T: Any + Send + Sync> DescriptorBuilder<T> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 让替身可录制：`stubs` 必须就是 `value` 内部查询的那一份行为表。
    pub fn with_stubs(mut self, stubs: Arc<Stubs>) -> Self {
        self.stubs = Some(stubs);
        self
    }

    pub fn build(self) -> DoubleDescriptor {
        let double = match self.stubs {
            Some(stubs) => Double::stubbed(self.value, stubs),
            None => Double::value(self.value),
        };
        DoubleDescriptor::new(double, self.name, Type::of::<T>())
    }
}
