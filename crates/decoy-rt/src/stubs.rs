use std::any::Any;
use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::double::Instance;
use crate::types::{Primitive, Type};

/// 录制行为时对单个实参的匹配规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMatcher {
    /// 通配任意实参。
    Any,
    /// 只接受该原始类型的实参。
    AnyPrimitive(Primitive),
}

impl ArgMatcher {
    pub fn for_type(ty: Type) -> Self {
        match Primitive::of(ty) {
            Some(p) => ArgMatcher::AnyPrimitive(p),
            None => ArgMatcher::Any,
        }
    }

    pub fn matches(&self, arg: &dyn Any) -> bool {
        match self {
            ArgMatcher::Any => true,
            ArgMatcher::AnyPrimitive(p) => p.accepts(arg),
        }
    }
}

struct Stubbing {
    method: String,
    matchers: Vec<ArgMatcher>,
    value: Instance,
}

impl Stubbing {
    fn matches(&self, method: &str, args: &[&dyn Any]) -> bool {
        self.method == method
            && self.matchers.len() == args.len()
            && self
                .matchers
                .iter()
                .zip(args)
                .all(|(m, arg)| m.matches(*arg))
    }
}

/// 替身的行为表：可被录制的替身都持有一份。
///
/// 生成的替身在每次方法调用时查表；多条录制同时匹配时，最后录制的生效。
#[derive(Default)]
pub struct Stubs {
    entries: RwLock<Vec<Stubbing>>,
    calls: Mutex<BTreeMap<String, usize>>,
}

impl Stubs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, method: &str, matchers: Vec<ArgMatcher>, value: Instance) {
        self.entries.write().push(Stubbing {
            method: method.to_string(),
            matchers,
            value,
        });
    }

    pub fn answer<R: Any + Clone>(&self, method: &str, args: &[&dyn Any]) -> Option<R> {
        *self.calls.lock().entry(method.to_string()).or_default() += 1;

        let entries = self.entries.read();
        let hit = entries.iter().rev().find(|s| s.matches(method, args))?;
        let value = hit.value.downcast_ref::<R>().cloned();
        trace!(method, answered = value.is_some(), "替身方法命中录制");
        value
    }

    /// 未录制时返回类型默认值，这就是替身“未配置”的行为。
    pub fn answer_or_default<R: Any + Clone + Default>(
        &self,
        method: &str,
        args: &[&dyn Any],
    ) -> R {
        self.answer(method, args).unwrap_or_default()
    }

    pub fn is_stubbed(&self, method: &str) -> bool {
        self.entries.read().iter().any(|s| s.method == method)
    }

    pub fn invocations(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for Stubs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods: Vec<String> = self
            .entries
            .read()
            .iter()
            .map(|s| s.method.clone())
            .collect();
        f.debug_struct("Stubs").field("stubbed", &methods).finish()
    }
}
