use std::sync::Arc;

use crate::factory::StubFactory;
use crate::member::MethodDef;
use crate::registry::{Registry, TypeInfo};
use crate::stubs::Stubs;

/// 协作者 trait 的替身描述，由 `#[contract]` 为 `dyn Trait` 实现。
///
/// 替身以 `Arc<dyn Trait>` 的形式注入，方法也登记在这个类型下，录制时按它筛选。
pub trait Contract: 'static {
    /// trait 的全部方法签名。
    fn methods() -> Vec<MethodDef>;

    /// 造一个查询 `stubs` 的替身。
    fn double(stubs: Arc<Stubs>) -> Arc<Self>;
}

impl Registry {
    pub fn register_contract<C>(&mut self) -> &mut Self
    where
        C: Contract + ?Sized,
    {
        let info = C::methods()
            .into_iter()
            .fold(TypeInfo::of::<Arc<C>>(), TypeInfo::method);
        self.register(info)
    }
}

impl StubFactory {
    pub fn register_contract<C>(&mut self) -> &mut Self
    where
        C: Contract + Send + Sync + ?Sized,
    {
        self.register::<Arc<C>, _>(C::double)
    }
}
