use std::any::Any;
use std::cell::Cell;
use std::sync::Arc;

use crate::double::Instance;
use crate::error::AccessError;
use crate::types::{Type, TypeLiteral};

/// 正在构造、注入的被测对象（类型擦除）。
pub type Subject = dyn Any + Send;

pub type AccessResult<T> = Result<T, AccessError>;

pub(crate) type FieldWriter = Arc<dyn Fn(&mut Subject, Instance) -> AccessResult<()> + Send + Sync>;
pub(crate) type MethodInvoker = Arc<dyn Fn(&mut Subject, &Args) -> AccessResult<()> + Send + Sync>;
pub(crate) type ConstructorFn = Arc<dyn Fn(&Args) -> AccessResult<Box<Subject>> + Send + Sync>;
pub(crate) type Projection = Arc<dyn Fn(&mut Subject) -> Option<&mut Subject> + Send + Sync>;

pub(crate) fn field_writer<F>(f: F) -> FieldWriter
where
    F: Fn(&mut Subject, Instance) -> AccessResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn method_invoker<F>(f: F) -> MethodInvoker
where
    F: Fn(&mut Subject, &Args) -> AccessResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn projection<F>(f: F) -> Projection
where
    F: Fn(&mut Subject) -> Option<&mut Subject> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Field,
    Method,
    Constructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// 构造函数与方法的位置实参。
pub struct Args(Vec<Instance>);

impl Args {
    pub fn new(values: Vec<Instance>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn take<T: Any + Clone>(&self, index: usize) -> AccessResult<T> {
        let value = self
            .0
            .get(index)
            .ok_or(AccessError::MissingArgument { index })?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or(AccessError::ArgumentType {
                index,
                expected: std::any::type_name::<T>(),
            })
    }
}

fn downcast_subject<S: Any>(subject: &mut Subject) -> AccessResult<&mut S> {
    subject.downcast_mut::<S>().ok_or(AccessError::SubjectType {
        expected: std::any::type_name::<S>(),
    })
}

/// 字段注册记录。
#[derive(Clone)]
pub struct FieldDef {
    name: &'static str,
    ty: Type,
    declaring: Type,
    markers: Vec<&'static str>,
    visibility: Visibility,
    writer: FieldWriter,
}

impl FieldDef {
    pub fn new<S, V, F>(name: &'static str, write: F) -> Self
    where
        S: Any + Send,
        V: Any + Send + Sync + Clone,
        F: Fn(&mut S, V) + Send + Sync + 'static,
    {
        let writer = field_writer(move |subject, value| {
            let subject = downcast_subject::<S>(subject)?;
            let value = value
                .downcast_ref::<V>()
                .cloned()
                .ok_or(AccessError::ArgumentType {
                    index: 0,
                    expected: std::any::type_name::<V>(),
                })?;
            write(subject, value);
            Ok(())
        });
        Self {
            name,
            ty: Type::of::<V>(),
            declaring: Type::of::<S>(),
            markers: Vec::new(),
            visibility: Visibility::Public,
            writer,
        }
    }

    pub fn marked(mut self, marker: &'static str) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn markers(&self) -> &[&'static str] {
        &self.markers
    }

    pub(crate) fn projected(&self, project: &Projection) -> Self {
        let project = Arc::clone(project);
        let inner = Arc::clone(&self.writer);
        let declaring = self.declaring;
        let mut out = self.clone();
        out.writer = field_writer(move |subject, value| {
            let base = (*project)(subject).ok_or(AccessError::SubjectType {
                expected: declaring.name(),
            })?;
            (*inner)(base, value)
        });
        out
    }
}

/// 方法注册记录。没有调用实现的方法只参与方法筛选，不能被注入调用。
#[derive(Clone)]
pub struct MethodDef {
    name: &'static str,
    declaring: Type,
    params: Vec<Type>,
    returns: TypeLiteral,
    markers: Vec<&'static str>,
    visibility: Visibility,
    invoker: Option<MethodInvoker>,
}

impl MethodDef {
    /// 只有签名的方法声明；声明类型由 [`crate::TypeInfo::method`] 补上。
    pub fn new(name: &'static str, params: Vec<Type>, returns: impl Into<TypeLiteral>) -> Self {
        Self {
            name,
            declaring: Type::of::<()>(),
            params,
            returns: returns.into(),
            markers: Vec::new(),
            visibility: Visibility::Public,
            invoker: None,
        }
    }

    /// 单参数 setter：`set_x(&mut self, v: V)`。
    pub fn setter<S, V, F>(name: &'static str, set: F) -> Self
    where
        S: Any + Send,
        V: Any + Send + Sync + Clone,
        F: Fn(&mut S, V) + Send + Sync + 'static,
    {
        Self::new(name, vec![Type::of::<V>()], Type::of::<()>()).invoker(
            move |subject: &mut S, args: &Args| {
                set(subject, args.take::<V>(0)?);
                Ok(())
            },
        )
    }

    pub fn invoker<S, F>(mut self, invoke: F) -> Self
    where
        S: Any + Send,
        F: Fn(&mut S, &Args) -> AccessResult<()> + Send + Sync + 'static,
    {
        self.declaring = Type::of::<S>();
        self.invoker = Some(method_invoker(move |subject, args| {
            invoke(downcast_subject::<S>(subject)?, args)
        }));
        self
    }

    pub fn marked(mut self, marker: &'static str) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn markers(&self) -> &[&'static str] {
        &self.markers
    }

    pub(crate) fn declared_by(mut self, declaring: Type) -> Self {
        self.declaring = declaring;
        self
    }

    pub(crate) fn projected(&self, project: &Projection) -> Self {
        let mut out = self.clone();
        let Some(inner) = self.invoker.clone() else {
            return out;
        };
        let project = Arc::clone(project);
        let declaring = self.declaring;
        out.invoker = Some(method_invoker(move |subject, args| {
            let base = (*project)(subject).ok_or(AccessError::SubjectType {
                expected: declaring.name(),
            })?;
            (*inner)(base, args)
        }));
        out
    }
}

/// 构造函数注册记录。构造函数不继承。
#[derive(Clone)]
pub struct ConstructorDef {
    name: &'static str,
    declaring: Type,
    params: Vec<Type>,
    markers: Vec<&'static str>,
    visibility: Visibility,
    construct: ConstructorFn,
}

impl ConstructorDef {
    pub fn new<S, F>(name: &'static str, params: Vec<Type>, construct: F) -> Self
    where
        S: Any + Send,
        F: Fn(&Args) -> AccessResult<S> + Send + Sync + 'static,
    {
        let construct: ConstructorFn = Arc::new(move |args: &Args| -> AccessResult<Box<Subject>> {
            Ok(Box::new(construct(args)?))
        });
        Self {
            name,
            declaring: Type::of::<S>(),
            params,
            markers: Vec::new(),
            visibility: Visibility::Public,
            construct,
        }
    }

    pub fn no_arg<S, F>(name: &'static str, construct: F) -> Self
    where
        S: Any + Send,
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self::new(name, Vec::new(), move |_: &Args| Ok(construct()))
    }

    pub fn marked(mut self, marker: &'static str) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn markers(&self) -> &[&'static str] {
        &self.markers
    }
}

/// `fn(&mut S, A0, A1, ..)` 形状的方法：参数类型从签名推出。生成代码用它登记方法。
pub trait MethodSignature<S, Params>: Send + Sync + 'static {
    fn params() -> Vec<Type>;
    fn invoke_with(&self, subject: &mut S, args: &Args) -> AccessResult<()>;
}

/// `fn(A0, A1, ..) -> S` 形状的构造函数。
pub trait ConstructorSignature<S, Params>: Send + Sync + 'static {
    fn params() -> Vec<Type>;
    fn construct_with(&self, args: &Args) -> AccessResult<S>;
}

macro_rules! impl_signatures {
    ($($arg:ident $idx:tt),*) => {
        impl<S, F, $($arg,)*> MethodSignature<S, ($($arg,)*)> for F
        where
            S: Any + Send,
            F: Fn(&mut S, $($arg),*) + Send + Sync + 'static,
            $($arg: Any + Send + Sync + Clone,)*
        {
            fn params() -> Vec<Type> {
                vec![$(Type::of::<$arg>()),*]
            }

            #[allow(unused_variables)]
            fn invoke_with(&self, subject: &mut S, args: &Args) -> AccessResult<()> {
                (self)(subject, $(args.take::<$arg>($idx)?),*);
                Ok(())
            }
        }

        impl<S, F, $($arg,)*> ConstructorSignature<S, ($($arg,)*)> for F
        where
            S: Any + Send,
            F: Fn($($arg),*) -> S + Send + Sync + 'static,
            $($arg: Any + Send + Sync + Clone,)*
        {
            fn params() -> Vec<Type> {
                vec![$(Type::of::<$arg>()),*]
            }

            #[allow(unused_variables)]
            fn construct_with(&self, args: &Args) -> AccessResult<S> {
                Ok((self)($(args.take::<$arg>($idx)?),*))
            }
        }
    };
}

impl_signatures!();
impl_signatures!(A0 0);
impl_signatures!(A0 0, A1 1);
impl_signatures!(A0 0, A1 1, A2 2);
impl_signatures!(A0 0, A1 1, A2 2, A3 3);
impl_signatures!(A0 0, A1 1, A2 2, A3 3, A4 4);
impl_signatures!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5);

impl MethodDef {
    /// `MethodDef::of("set_name", Person::set_name)`
    pub fn of<S, P, F>(name: &'static str, method: F) -> Self
    where
        S: Any + Send,
        P: 'static,
        F: MethodSignature<S, P>,
    {
        let invoke = move |subject: &mut S, args: &Args| method.invoke_with(subject, args);
        Self::new(name, F::params(), Type::of::<()>()).invoker(invoke)
    }
}

impl ConstructorDef {
    /// `ConstructorDef::of("new", Person::new)`
    pub fn of<S, P, F>(name: &'static str, construct: F) -> Self
    where
        S: Any + Send,
        P: 'static,
        F: ConstructorSignature<S, P>,
    {
        let build = move |args: &Args| construct.construct_with(args);
        Self::new(name, F::params(), build)
    }
}

/// 可开关的访问标记。非公开成员只有在标记打开时才能写入或调用。
pub trait Accessible {
    fn is_accessible(&self) -> bool;
    fn set_accessible(&self, accessible: bool);
}

/// 在作用域内打开成员访问权限，离开作用域时恢复原值。
pub struct AccessScope<'a> {
    member: &'a dyn Accessible,
    previous: bool,
}

impl<'a> AccessScope<'a> {
    pub fn open(member: &'a dyn Accessible) -> Self {
        let previous = member.is_accessible();
        member.set_accessible(true);
        Self { member, previous }
    }
}

impl Drop for AccessScope<'_> {
    fn drop(&mut self) {
        self.member.set_accessible(self.previous);
    }
}

fn check_access(
    visibility: Visibility,
    accessible: &Cell<bool>,
    member: &str,
) -> AccessResult<()> {
    if visibility == Visibility::Private && !accessible.get() {
        return Err(AccessError::Inaccessible {
            member: member.to_string(),
        });
    }
    Ok(())
}

macro_rules! impl_accessible {
    ($($handle:ty),*) => {$(
        impl Accessible for $handle {
            fn is_accessible(&self) -> bool {
                self.accessible.get()
            }

            fn set_accessible(&self, accessible: bool) {
                self.accessible.set(accessible);
            }
        }
    )*};
}

/// 每次枚举新产生的字段句柄。
pub struct Field {
    def: FieldDef,
    accessible: Cell<bool>,
}

impl Field {
    pub(crate) fn from_def(def: FieldDef) -> Self {
        Self {
            def,
            accessible: Cell::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn ty(&self) -> Type {
        self.def.ty
    }

    pub fn declaring(&self) -> Type {
        self.def.declaring
    }

    pub fn markers(&self) -> &[&'static str] {
        &self.def.markers
    }

    pub fn visibility(&self) -> Visibility {
        self.def.visibility
    }

    pub fn write(&self, subject: &mut Subject, value: Instance) -> AccessResult<()> {
        check_access(self.def.visibility, &self.accessible, self.def.name)?;
        (*self.def.writer)(subject, value)
    }
}

pub struct Method {
    def: MethodDef,
    accessible: Cell<bool>,
}

impl Method {
    pub(crate) fn from_def(def: MethodDef) -> Self {
        Self {
            def,
            accessible: Cell::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn declaring(&self) -> Type {
        self.def.declaring
    }

    pub fn params(&self) -> &[Type] {
        &self.def.params
    }

    pub fn returns(&self) -> &TypeLiteral {
        &self.def.returns
    }

    pub fn markers(&self) -> &[&'static str] {
        &self.def.markers
    }

    pub fn visibility(&self) -> Visibility {
        self.def.visibility
    }

    pub fn is_invocable(&self) -> bool {
        self.def.invoker.is_some()
    }

    pub fn invoke(&self, subject: &mut Subject, args: &Args) -> AccessResult<()> {
        check_access(self.def.visibility, &self.accessible, self.def.name)?;
        let Some(invoker) = self.def.invoker.as_ref() else {
            return Err(AccessError::NotInvocable {
                member: self.def.name.to_string(),
            });
        };
        (**invoker)(subject, args)
    }
}

pub struct Constructor {
    def: ConstructorDef,
    accessible: Cell<bool>,
}

impl Constructor {
    pub(crate) fn from_def(def: ConstructorDef) -> Self {
        Self {
            def,
            accessible: Cell::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn declaring(&self) -> Type {
        self.def.declaring
    }

    pub fn params(&self) -> &[Type] {
        &self.def.params
    }

    pub fn markers(&self) -> &[&'static str] {
        &self.def.markers
    }

    pub fn visibility(&self) -> Visibility {
        self.def.visibility
    }

    pub fn construct(&self, args: &Args) -> AccessResult<Box<Subject>> {
        check_access(self.def.visibility, &self.accessible, self.def.name)?;
        (*self.def.construct)(args)
    }
}

impl_accessible!(Field, Method, Constructor);

/// 交给注入点策略判断的成员。
#[derive(Clone, Copy)]
pub enum Member<'a> {
    Field(&'a Field),
    Method(&'a Method),
    Constructor(&'a Constructor),
}

impl Member<'_> {
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Field(_) => MemberKind::Field,
            Member::Method(_) => MemberKind::Method,
            Member::Constructor(_) => MemberKind::Constructor,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Member::Field(f) => f.name(),
            Member::Method(m) => m.name(),
            Member::Constructor(c) => c.name(),
        }
    }

    pub fn markers(&self) -> &[&'static str] {
        match self {
            Member::Field(f) => f.markers(),
            Member::Method(m) => m.markers(),
            Member::Constructor(c) => c.markers(),
        }
    }
}
