use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 运行期类型标识。相等与哈希只看 `TypeId`，名字仅用于诊断信息。
#[derive(Clone, Copy)]
pub struct Type {
    id: TypeId,
    name: &'static str,
}

impl Type {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// 值的动态类型是否就是当前类型。
    pub fn is_type_of(&self, value: &dyn Any) -> bool {
        Any::type_id(value) == self.id
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 带声明泛型实参的类型描述。
///
/// Rust 的 `TypeId` 本身已经区分 `Vec<i32>` 与 `Vec<String>`；这里额外保留
/// 注册时写下的泛型实参列表，供方法筛选按“参数化返回类型”匹配。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeLiteral {
    ty: Type,
    args: Vec<Type>,
}

impl TypeLiteral {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            ty: Type::of::<T>(),
            args: Vec::new(),
        }
    }

    pub fn parameterized<T: ?Sized + 'static>(args: impl IntoIterator<Item = Type>) -> Self {
        Self {
            ty: Type::of::<T>(),
            args: args.into_iter().collect(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Type>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn is_parameterized(&self) -> bool {
        !self.args.is_empty()
    }
}

impl From<Type> for TypeLiteral {
    fn from(ty: Type) -> Self {
        Self {
            ty,
            args: Vec::new(),
        }
    }
}

impl fmt::Display for TypeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        if self.args.is_empty() {
            return Ok(());
        }
        f.write_str(" [")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str("]")
    }
}

/// 万物基类型。每个已注册类型的方法列表末尾都会附上它的方法。
pub enum Object {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

impl Primitive {
    pub const ALL: [Primitive; 16] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::I128,
        Primitive::Isize,
        Primitive::U8,
        Primitive::U16,
        Primitive::U32,
        Primitive::U64,
        Primitive::U128,
        Primitive::Usize,
        Primitive::F32,
        Primitive::F64,
    ];

    pub fn ty(self) -> Type {
        match self {
            Primitive::Bool => Type::of::<bool>(),
            Primitive::Char => Type::of::<char>(),
            Primitive::I8 => Type::of::<i8>(),
            Primitive::I16 => Type::of::<i16>(),
            Primitive::I32 => Type::of::<i32>(),
            Primitive::I64 => Type::of::<i64>(),
            Primitive::I128 => Type::of::<i128>(),
            Primitive::Isize => Type::of::<isize>(),
            Primitive::U8 => Type::of::<u8>(),
            Primitive::U16 => Type::of::<u16>(),
            Primitive::U32 => Type::of::<u32>(),
            Primitive::U64 => Type::of::<u64>(),
            Primitive::U128 => Type::of::<u128>(),
            Primitive::Usize => Type::of::<usize>(),
            Primitive::F32 => Type::of::<f32>(),
            Primitive::F64 => Type::of::<f64>(),
        }
    }

    pub fn of(ty: Type) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.ty() == ty)
    }

    pub fn accepts(self, value: &dyn Any) -> bool {
        self.ty().is_type_of(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_按typeid比较_名字只用于展示() {
        assert_eq!(Type::of::<String>(), Type::of::<String>());
        assert_ne!(Type::of::<String>(), Type::of::<&'static str>());
        assert!(Type::of::<u8>().is::<u8>());
        assert!(Type::of::<String>().to_string().contains("String"));
    }

    #[test]
    fn primitive_覆盖识别与实参检查() {
        assert_eq!(Primitive::of(Type::of::<i32>()), Some(Primitive::I32));
        assert_eq!(Primitive::of(Type::of::<f64>()), Some(Primitive::F64));
        assert_eq!(Primitive::of(Type::of::<String>()), None);

        assert!(Primitive::I32.accepts(&5i32));
        assert!(!Primitive::I32.accepts(&5i64));
        assert!(!Primitive::Bool.accepts(&"true"));
    }

    #[test]
    fn type_literal_展示泛型实参() {
        let plain = TypeLiteral::of::<Vec<i32>>();
        assert!(!plain.is_parameterized());

        let lit = TypeLiteral::parameterized::<Vec<i32>>([Type::of::<i32>()]);
        assert!(lit.is_parameterized());
        assert_eq!(lit.args(), &[Type::of::<i32>()]);
        assert!(lit.to_string().ends_with("[i32]"));
        assert_ne!(plain, lit);
    }
}
