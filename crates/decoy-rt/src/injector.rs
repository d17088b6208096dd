use std::any::Any;
use std::sync::Arc;

use crate::context::{self, TestHandle};
use crate::double::DoubleDescriptor;
use crate::engine::{InjectionEngine, SubjectInstantiation};
use crate::error::InjectError;
use crate::factory::DoubleFactory;
use crate::member::MemberKind;
use crate::policy::{InjectionPoint, MarkedInjectionPoint};
use crate::registry::MemberEnumerator;
use crate::resolve::SetterConvention;

/// 注入入口：`Injector::builder(members, factory).marked_with("inject").build()?`
pub struct InjectorBuilder {
    members: Arc<dyn MemberEnumerator>,
    factory: Arc<dyn DoubleFactory>,
    point: Option<Arc<dyn InjectionPoint>>,
    markers: Vec<String>,
    excluded: Vec<MemberKind>,
    setter_prefix: Option<String>,
}

impl InjectorBuilder {
    /// 直接指定注入点策略；此时标记与排除配置不再生效。
    pub fn with_injection_point(mut self, point: impl InjectionPoint + 'static) -> Self {
        self.point = Some(Arc::new(point));
        self
    }

    pub fn marked_with(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn excluding(mut self, kind: MemberKind) -> Self {
        self.excluded.push(kind);
        self
    }

    pub fn setter_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.setter_prefix = Some(prefix.into());
        self
    }

    /// 没有指定策略也没有配置标记时，从 [`crate::WELL_KNOWN_MARKERS`] 里自动探测。
    pub fn build(self) -> Result<Injector, InjectError> {
        let point: Arc<dyn InjectionPoint> = match self.point {
            Some(point) => point,
            None => {
                let mut marked = if self.markers.is_empty() {
                    MarkedInjectionPoint::detect(&*self.members)?
                } else {
                    MarkedInjectionPoint::new(self.markers)
                };
                for kind in self.excluded {
                    marked = marked.excluding(kind);
                }
                Arc::new(marked)
            }
        };
        let setters = match self.setter_prefix {
            Some(prefix) => SetterConvention::new(prefix)?,
            None => SetterConvention::default(),
        };
        let engine =
            InjectionEngine::new(self.members, self.factory).with_setter_convention(setters);
        Ok(Injector { engine, point })
    }
}

#[derive(Clone)]
pub struct Injector {
    engine: InjectionEngine,
    point: Arc<dyn InjectionPoint>,
}

impl Injector {
    pub fn builder(
        members: Arc<dyn MemberEnumerator>,
        factory: Arc<dyn DoubleFactory>,
    ) -> InjectorBuilder {
        InjectorBuilder {
            members,
            factory,
            point: None,
            markers: Vec::new(),
            excluded: Vec::new(),
            setter_prefix: None,
        }
    }

    pub fn engine(&self) -> &InjectionEngine {
        &self.engine
    }

    pub fn point(&self) -> &dyn InjectionPoint {
        &*self.point
    }

    /// 不登记任何全局状态，结果里自带测试上下文。
    pub fn instantiate_and_inject<T: Any + Send>(
        &self,
        doubles: &[DoubleDescriptor],
    ) -> Result<SubjectInstantiation<T>, InjectError> {
        self.engine.create_and_inject(&*self.point, doubles)
    }

    /// 创建并注入被测对象，同时把上下文登记为当前线程的上下文，供 [`crate::given`] 使用。
    pub fn instance_for_testing<T: Any + Send>(
        &self,
        doubles: &[DoubleDescriptor],
    ) -> Result<T, InjectError> {
        let (instance, ctx) = self.instantiate_and_inject::<T>(doubles)?.into_parts();
        context::publish(ctx);
        Ok(instance)
    }

    pub fn instance_for_handle<T: Any + Send>(
        &self,
        handle: &TestHandle,
        doubles: &[DoubleDescriptor],
    ) -> Result<T, InjectError> {
        let (instance, ctx) = self.instantiate_and_inject::<T>(doubles)?.into_parts();
        handle.publish(ctx);
        Ok(instance)
    }
}
