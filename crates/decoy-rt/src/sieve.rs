use crate::member::Method;
use crate::registry::MemberEnumerator;
use crate::types::{Object, Type, TypeLiteral};

/// 这些方法关系到替身自身的相等与哈希语义，永远不参与录制。
pub const IDENTITY_METHODS: &[&str] = &["eq", "ne", "hash", "equals", "hash_code"];

pub fn is_identity_method(name: &str) -> bool {
    IDENTITY_METHODS.contains(&name)
}

/// `methods_of(&registry, ty).that_return(literal).as_set()`
pub fn methods_of(members: &dyn MemberEnumerator, class_to_sift: Type) -> MethodSieve<'_> {
    MethodSieve {
        members,
        class_to_sift,
    }
}

pub struct MethodSieve<'a> {
    members: &'a dyn MemberEnumerator,
    class_to_sift: Type,
}

impl<'a> MethodSieve<'a> {
    pub fn that_return(self, returns: impl Into<TypeLiteral>) -> ReturnSieve<'a> {
        ReturnSieve {
            members: self.members,
            class_to_sift: self.class_to_sift,
            expected: returns.into(),
        }
    }

    pub fn that_return_parameterized(self, returns: Type, args: &[Type]) -> ReturnSieve<'a> {
        self.that_return(TypeLiteral::from(returns).with_args(args.iter().copied()))
    }
}

pub struct ReturnSieve<'a> {
    members: &'a dyn MemberEnumerator,
    class_to_sift: Type,
    expected: TypeLiteral,
}

impl ReturnSieve<'_> {
    /// 返回类型精确匹配的方法；给了泛型实参时，方法返回类型也必须是参数化类型且实参逐个相等。
    ///
    /// 不含声明在 `Object` 上的方法和身份方法；同名同参数的方法只保留最派生的那个。
    pub fn as_set(&self) -> Vec<Method> {
        let object = Type::of::<Object>();
        let mut out: Vec<Method> = Vec::new();
        for method in self.members.methods_of(self.class_to_sift) {
            if method.declaring() == object || is_identity_method(method.name()) {
                continue;
            }
            if !returns_match(method.returns(), &self.expected) {
                continue;
            }
            let shadowed = out
                .iter()
                .any(|m| m.name() == method.name() && m.params() == method.params());
            if !shadowed {
                out.push(method);
            }
        }
        out
    }
}

fn returns_match(actual: &TypeLiteral, expected: &TypeLiteral) -> bool {
    if actual.ty() != expected.ty() {
        return false;
    }
    if !expected.is_parameterized() {
        return true;
    }
    actual.is_parameterized() && actual.args() == expected.args()
}
