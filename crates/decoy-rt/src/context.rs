use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::double::DoubleDescriptor;
use crate::error::InjectError;
use crate::recorder::record_behavior;
use crate::registry::MemberEnumerator;
use crate::types::TypeLiteral;

/// 一次注入留下的测试上下文：用到的替身，加上筛选方法要用的成员枚举。
#[derive(Clone)]
pub struct TestContext {
    members: Arc<dyn MemberEnumerator>,
    doubles: Arc<[DoubleDescriptor]>,
}

impl TestContext {
    pub fn new(members: Arc<dyn MemberEnumerator>, doubles: Vec<DoubleDescriptor>) -> Self {
        Self {
            members,
            doubles: doubles.into(),
        }
    }

    pub fn doubles(&self) -> &[DoubleDescriptor] {
        &self.doubles
    }

    pub fn members(&self) -> &Arc<dyn MemberEnumerator> {
        &self.members
    }

    /// `context.given::<i32>().is_requested().then_return(4)`
    pub fn given<R: Any + Send + Sync>(&self) -> Assumption<R> {
        self.given_literal(TypeLiteral::of::<R>())
    }

    pub fn given_object_of<R: Any + Send + Sync>(&self) -> Assumption<R> {
        self.given()
    }

    /// 按参数化返回类型录制，例如只匹配声明为 `Vec<i32>` 且带实参 `[i32]` 的方法。
    pub fn given_literal<R: Any + Send + Sync>(&self, returns: TypeLiteral) -> Assumption<R> {
        Assumption {
            context: self.clone(),
            returns,
            _returns: PhantomData,
        }
    }
}

pub struct Assumption<R> {
    context: TestContext,
    returns: TypeLiteral,
    _returns: PhantomData<fn() -> R>,
}

impl<R: Any + Send + Sync> Assumption<R> {
    pub fn is_requested(self) -> Stubbing<R> {
        Stubbing {
            context: self.context,
            returns: self.returns,
            _returns: PhantomData,
        }
    }
}

pub struct Stubbing<R> {
    context: TestContext,
    returns: TypeLiteral,
    _returns: PhantomData<fn() -> R>,
}

impl<R: Any + Send + Sync> Stubbing<R> {
    /// 返回录制的方法数。
    pub fn then_return(self, value: R) -> Result<usize, InjectError> {
        record_behavior(
            &*self.context.members,
            &self.context.doubles,
            self.returns,
            value,
        )
    }
}

thread_local! {
    static CURRENT: RefCell<Option<TestContext>> = const { RefCell::new(None) };
}

/// 把上下文登记为当前线程（当前测试）的上下文，覆盖之前的登记。线程结束时随之释放。
pub fn publish(context: TestContext) {
    CURRENT.with(|current| *current.borrow_mut() = Some(context));
}

pub fn current() -> Result<TestContext, InjectError> {
    CURRENT
        .with(|current| current.borrow().clone())
        .ok_or(InjectError::NotInitialized)
}

pub fn clear() {
    CURRENT.with(|current| current.borrow_mut().take());
}

/// 读当前线程的上下文；当前测试还没有注入过时报 [`InjectError::NotInitialized`]。
pub fn given<R: Any + Send + Sync>() -> Result<Assumption<R>, InjectError> {
    Ok(current()?.given())
}

pub fn given_literal<R: Any + Send + Sync>(
    returns: TypeLiteral,
) -> Result<Assumption<R>, InjectError> {
    Ok(current()?.given_literal(returns))
}

/// 不依赖线程身份的测试标识。最后一个克隆释放时，它登记的上下文随之移除。
#[derive(Clone)]
pub struct TestHandle(Arc<HandleKey>);

impl Default for TestHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHandle {
    pub fn new() -> Self {
        Self::in_registry(&HANDLES)
    }

    fn in_registry(registry: &'static HandleRegistry) -> Self {
        Self(Arc::new(HandleKey {
            id: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            registry,
        }))
    }

    pub fn publish(&self, context: TestContext) {
        self.0.registry.publish(self.0.id, context);
    }

    pub fn context(&self) -> Result<TestContext, InjectError> {
        self.0
            .registry
            .get(self.0.id)
            .ok_or(InjectError::NotInitialized)
    }

    pub fn given<R: Any + Send + Sync>(&self) -> Result<Assumption<R>, InjectError> {
        Ok(self.context()?.given())
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0);

struct HandleKey {
    id: u64,
    registry: &'static HandleRegistry,
}

impl Drop for HandleKey {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

struct HandleRegistry {
    entries: Mutex<Vec<(u64, TestContext)>>,
}

static HANDLES: HandleRegistry = HandleRegistry::new();

impl HandleRegistry {
    const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn publish(&self, id: u64, context: TestContext) {
        let previous = {
            let mut entries = self.entries.lock();
            match entries.iter_mut().find(|(key, _)| *key == id) {
                Some((_, slot)) => Some(std::mem::replace(slot, context)),
                None => {
                    entries.push((id, context));
                    None
                }
            }
        };
        drop(previous);
    }

    fn get(&self, id: u64) -> Option<TestContext> {
        self.entries
            .lock()
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, context)| context.clone())
    }

    /// 被移除的上下文在锁外释放。
    fn remove(&self, id: u64) {
        let removed = {
            let mut entries = self.entries.lock();
            entries
                .iter()
                .position(|(key, _)| *key == id)
                .map(|index| entries.swap_remove(index))
        };
        drop(removed);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
