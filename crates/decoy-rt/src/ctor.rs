use tracing::debug;

use crate::error::InjectError;
use crate::member::{Constructor, Member};
use crate::policy::InjectionPoint;
use crate::types::Type;

#[derive(Clone, Copy)]
pub enum ConstructorChoice<'a> {
    /// 唯一一个被注入点策略认可的构造函数，参数全部由替身填充。
    Injection(&'a Constructor),
    /// 没有可注入的构造函数时退回无参构造函数。
    NoArg(&'a Constructor),
}

impl<'a> ConstructorChoice<'a> {
    pub fn constructor(&self) -> &'a Constructor {
        match *self {
            ConstructorChoice::Injection(c) | ConstructorChoice::NoArg(c) => c,
        }
    }
}

/// 选出用来实例化被测类型的构造函数。
///
/// 无参构造函数只作为退路，不参与可注入判断。有参且可注入的构造函数超过一个直接报错；
/// 恰好一个就用它；一个都没有时用无参构造函数；两者都没有也报错。
pub fn select_constructor<'a>(
    subject: Type,
    constructors: &'a [Constructor],
    point: &dyn InjectionPoint,
) -> Result<ConstructorChoice<'a>, InjectError> {
    let mut candidate: Option<&Constructor> = None;
    let mut no_arg: Option<&Constructor> = None;

    for ctor in constructors {
        if ctor.params().is_empty() {
            if no_arg.is_none() {
                no_arg = Some(ctor);
            }
            continue;
        }
        if !point.is_injectable(Member::Constructor(ctor)) {
            continue;
        }
        if candidate.is_some() {
            return Err(InjectError::AmbiguousConstructors { subject });
        }
        candidate = Some(ctor);
    }

    if let Some(ctor) = candidate {
        debug!(subject = %subject, ctor = ctor.name(), "使用可注入的构造函数");
        return Ok(ConstructorChoice::Injection(ctor));
    }
    let Some(ctor) = no_arg else {
        return Err(InjectError::NoUsableConstructor { subject });
    };
    debug!(subject = %subject, ctor = ctor.name(), "使用无参构造函数");
    Ok(ConstructorChoice::NoArg(ctor))
}
