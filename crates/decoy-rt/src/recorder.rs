use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use crate::double::{Double, DoubleDescriptor, Instance};
use crate::error::InjectError;
use crate::member::Method;
use crate::registry::MemberEnumerator;
use crate::sieve::{is_identity_method, methods_of};
use crate::stubs::ArgMatcher;
use crate::types::{Type, TypeLiteral};

/// 把“调用某方法就返回某值”录进替身的行为表。
pub struct BehaviorRecorder;

impl BehaviorRecorder {
    /// 每个参数都用通配匹配（原始类型参数用对应原始类型的通配），之后任何匹配的调用都返回 `value`。
    ///
    /// 替身不可录制或方法是身份方法时跳过，返回 `false`。
    pub fn record(double: &Double, method: &Method, value: Instance) -> bool {
        if is_identity_method(method.name()) {
            return false;
        }
        let Some(stubs) = double.stubs() else {
            return false;
        };
        let matchers = method
            .params()
            .iter()
            .map(|p| ArgMatcher::for_type(*p))
            .collect();
        stubs.stub(method.name(), matchers, value);
        true
    }
}

/// 对一组替身里所有返回 `returns` 的方法录制同一个返回值，返回录制的方法数。
pub fn record_behavior<R: Any + Send + Sync>(
    members: &dyn MemberEnumerator,
    doubles: &[DoubleDescriptor],
    returns: TypeLiteral,
    value: R,
) -> Result<usize, InjectError> {
    let actual = Type::of::<R>();
    if returns.ty() != actual {
        return Err(InjectError::ReturnTypeMismatch {
            expected: returns.ty(),
            actual,
        });
    }

    let value: Instance = Arc::new(value);
    let mut recorded = 0;
    for descriptor in doubles {
        if !descriptor.double().is_stubbable() {
            continue;
        }
        let methods = methods_of(members, descriptor.declared_type())
            .that_return(returns.clone())
            .as_set();
        for method in &methods {
            if BehaviorRecorder::record(descriptor.double(), method, value.clone()) {
                debug!(double = %descriptor, method = method.name(), returns = %returns, "已录制");
                recorded += 1;
            }
        }
    }
    Ok(recorded)
}
