use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

use crate::double::Double;
use crate::stubs::Stubs;
use crate::types::Type;

/// 替身工厂：为任意类型造一个替身。做不到时返回错误，由调用方补上槽位信息。
pub trait DoubleFactory: Send + Sync {
    fn create_double(&self, ty: Type) -> anyhow::Result<Double>;
}

impl<F> DoubleFactory for F
where
    F: Fn(Type) -> anyhow::Result<Double> + Send + Sync,
{
    fn create_double(&self, ty: Type) -> anyhow::Result<Double> {
        self(ty)
    }
}

type Recipe = Arc<dyn Fn() -> Double + Send + Sync>;

/// 按类型登记“配方”的替身工厂。
///
/// 内置原始类型与 `String` 的默认值（不可录制）；协作者类型通过 [`StubFactory::register`]
/// 登记，每次创建都带一份新的行为表。
#[derive(Clone)]
pub struct StubFactory {
    recipes: HashMap<Type, Recipe>,
}

impl Default for StubFactory {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! register_defaults {
    ($factory:expr, $($ty:ty),* $(,)?) => {
        $( $factory.register_default::<$ty>(); )*
    };
}

impl StubFactory {
    pub fn new() -> Self {
        let mut factory = Self::empty();
        register_defaults!(
            factory, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
            f32, f64, String,
        );
        factory
    }

    pub fn empty() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    /// 可录制的替身：`make` 拿到新的行为表，返回查询这张表的实现。
    pub fn register<T, F>(&mut self, make: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<Stubs>) -> T + Send + Sync + 'static,
    {
        let recipe: Recipe = Arc::new(move || {
            let stubs = Arc::new(Stubs::new());
            Double::stubbed(make(stubs.clone()), stubs)
        });
        self.recipes.insert(Type::of::<T>(), recipe);
        self
    }

    pub fn register_value<T>(&mut self, value: T) -> &mut Self
    where
        T: Any + Send + Sync + Clone,
    {
        let recipe: Recipe = Arc::new(move || Double::value(value.clone()));
        self.recipes.insert(Type::of::<T>(), recipe);
        self
    }

    pub fn register_default<T>(&mut self) -> &mut Self
    where
        T: Any + Send + Sync + Default,
    {
        let recipe: Recipe = Arc::new(|| Double::value(T::default()));
        self.recipes.insert(Type::of::<T>(), recipe);
        self
    }

    pub fn supports(&self, ty: Type) -> bool {
        self.recipes.contains_key(&ty)
    }
}

impl DoubleFactory for StubFactory {
    fn create_double(&self, ty: Type) -> anyhow::Result<Double> {
        let recipe = self
            .recipes
            .get(&ty)
            .ok_or_else(|| anyhow!("没有为类型 {ty} 登记替身配方"))?;
        Ok((**recipe)())
    }
}
