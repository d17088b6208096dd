use std::any::Any;
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::TestContext;
use crate::ctor::{ConstructorChoice, select_constructor};
use crate::double::{DoubleDescriptor, Instance};
use crate::error::{AccessError, InjectError};
use crate::factory::DoubleFactory;
use crate::member::{AccessScope, Args, Constructor, Member, Subject};
use crate::policy::InjectionPoint;
use crate::registry::MemberEnumerator;
use crate::resolve::{DoubleRepository, InjectionSlot, SetterConvention};
use crate::types::Type;

/// 一次注入的结果：被测对象，以及记录了所用替身的测试上下文。
pub struct SubjectInstantiation<T> {
    instance: T,
    context: TestContext,
}

impl<T> SubjectInstantiation<T> {
    pub fn instance(&self) -> &T {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut T {
        &mut self.instance
    }

    pub fn into_instance(self) -> T {
        self.instance
    }

    /// 实际放进槽位的替身（按身份去重，按首次使用排序）。
    pub fn used(&self) -> &[DoubleDescriptor] {
        self.context.doubles()
    }

    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn into_parts(self) -> (T, TestContext) {
        (self.instance, self.context)
    }
}

/// 注入引擎：选构造函数、实例化、填字段、调 setter，整个过程要么全部成功要么报错。
#[derive(Clone)]
pub struct InjectionEngine {
    members: Arc<dyn MemberEnumerator>,
    factory: Arc<dyn DoubleFactory>,
    setters: SetterConvention,
}

impl InjectionEngine {
    pub fn new(members: Arc<dyn MemberEnumerator>, factory: Arc<dyn DoubleFactory>) -> Self {
        Self {
            members,
            factory,
            setters: SetterConvention::default(),
        }
    }

    pub fn with_setter_convention(mut self, setters: SetterConvention) -> Self {
        self.setters = setters;
        self
    }

    pub fn members(&self) -> &Arc<dyn MemberEnumerator> {
        &self.members
    }

    pub fn create_and_inject<T: Any + Send>(
        &self,
        point: &dyn InjectionPoint,
        supplied: &[DoubleDescriptor],
    ) -> Result<SubjectInstantiation<T>, InjectError> {
        let subject = Type::of::<T>();
        let (instance, context) = self
            .create_and_inject_erased(subject, point, supplied)?
            .into_parts();
        let instance = instance
            .downcast::<T>()
            .map_err(|_| InjectError::Instantiation {
                subject,
                source: AccessError::SubjectType {
                    expected: subject.name(),
                },
            })?;
        Ok(SubjectInstantiation {
            instance: *instance,
            context,
        })
    }

    pub fn create_and_inject_erased(
        &self,
        subject: Type,
        point: &dyn InjectionPoint,
        supplied: &[DoubleDescriptor],
    ) -> Result<SubjectInstantiation<Box<Subject>>, InjectError> {
        let constructors = self.members.constructors_of(subject);
        let choice = select_constructor(subject, &constructors, point)?;
        let mut repository = DoubleRepository::new(supplied, &*self.factory, self.setters.clone());

        let mut instance = match choice {
            ConstructorChoice::Injection(ctor) => {
                let mut args = Vec::with_capacity(ctor.params().len());
                for param in ctor.params() {
                    let slot = InjectionSlot::constructor_parameter(*param, subject);
                    args.push(assigned_value(repository.assign(&slot)?));
                }
                instantiate(subject, ctor, Args::new(args))?
            }
            ConstructorChoice::NoArg(ctor) => instantiate(subject, ctor, Args::empty())?,
        };

        self.inject_fields(subject, &mut *instance, point, &mut repository)?;
        self.inject_methods(subject, &mut *instance, point, &mut repository)?;

        let used = repository.into_used();
        info!(subject = %subject, doubles = used.len(), "被测对象注入完成");
        Ok(SubjectInstantiation {
            instance,
            context: TestContext::new(self.members.clone(), used),
        })
    }

    fn inject_fields(
        &self,
        subject: Type,
        instance: &mut Subject,
        point: &dyn InjectionPoint,
        repository: &mut DoubleRepository<'_>,
    ) -> Result<(), InjectError> {
        for field in self.members.fields_of(subject) {
            if !point.is_injectable(Member::Field(&field)) {
                continue;
            }
            let slot = InjectionSlot::field(field.name(), field.ty(), field.declaring());
            let value = assigned_value(repository.assign(&slot)?);

            let _scope = AccessScope::open(&field);
            field
                .write(instance, value)
                .map_err(|source| InjectError::Injection {
                    subject,
                    member: field.name().to_string(),
                    source,
                })?;
            debug!(subject = %subject, field = field.name(), "字段已注入");
        }
        Ok(())
    }

    fn inject_methods(
        &self,
        subject: Type,
        instance: &mut Subject,
        point: &dyn InjectionPoint,
        repository: &mut DoubleRepository<'_>,
    ) -> Result<(), InjectError> {
        for method in self.members.methods_of(subject) {
            if !point.is_injectable(Member::Method(&method)) {
                continue;
            }
            let mut args = Vec::with_capacity(method.params().len());
            for param in method.params() {
                let slot =
                    InjectionSlot::method_parameter(method.name(), *param, method.declaring());
                args.push(assigned_value(repository.assign(&slot)?));
            }

            let _scope = AccessScope::open(&method);
            method
                .invoke(instance, &Args::new(args))
                .map_err(|source| InjectError::Injection {
                    subject,
                    member: method.name().to_string(),
                    source,
                })?;
            debug!(subject = %subject, method = method.name(), "注入方法已调用");
        }
        Ok(())
    }
}

fn assigned_value(descriptor: DoubleDescriptor) -> Instance {
    descriptor.double().instance().clone()
}

fn instantiate(subject: Type, ctor: &Constructor, args: Args) -> Result<Box<Subject>, InjectError> {
    let _scope = AccessScope::open(ctor);
    ctor.construct(&args)
        .map_err(|source| InjectError::Instantiation { subject, source })
}
