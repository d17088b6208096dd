use std::any::Any;
use std::collections::{BTreeSet, HashMap};

use crate::member::{
    Constructor, ConstructorDef, Field, FieldDef, Method, MethodDef, Projection, Subject,
    projection,
};
use crate::policy::MarkerEnvironment;
use crate::types::{Object, Type};

/// 成员枚举契约：给出一个类型的构造函数、字段（含继承链）与方法（含继承链和基类型 `Object`）。
///
/// 每次调用都返回新的成员句柄，句柄上的访问标记互不影响。
pub trait MemberEnumerator: MarkerEnvironment + Send + Sync {
    fn constructors_of(&self, ty: Type) -> Vec<Constructor>;
    fn fields_of(&self, ty: Type) -> Vec<Field>;
    fn methods_of(&self, ty: Type) -> Vec<Method>;
}

#[derive(Clone)]
struct BaseLink {
    ty: Type,
    project: Projection,
}

/// 一个类型的成员登记。
#[derive(Clone)]
pub struct TypeInfo {
    ty: Type,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
    base: Option<BaseLink>,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_type(Type::of::<T>())
    }

    pub fn for_type(ty: Type) -> Self {
        Self {
            ty,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            base: None,
        }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.push(def);
        self
    }

    pub fn method(mut self, def: MethodDef) -> Self {
        self.methods.push(def.declared_by(self.ty));
        self
    }

    pub fn constructor(mut self, def: ConstructorDef) -> Self {
        self.constructors.push(def);
        self
    }

    /// 声明基类型：`project` 从派生对象里取出基类型部分，继承来的字段和方法通过它写入。
    pub fn extends<S, B, F>(mut self, project: F) -> Self
    where
        S: Any + Send,
        B: Any + Send,
        F: Fn(&mut S) -> &mut B + Send + Sync + 'static,
    {
        let project = projection(move |subject: &mut Subject| {
            subject
                .downcast_mut::<S>()
                .map(|derived| project(derived) as &mut Subject)
        });
        self.base = Some(BaseLink {
            ty: Type::of::<B>(),
            project,
        });
        self
    }

    fn markers(&self) -> impl Iterator<Item = &'static str> + '_ {
        let fields = self.fields.iter().flat_map(|f| f.markers().iter().copied());
        let methods = self
            .methods
            .iter()
            .flat_map(|m| m.markers().iter().copied());
        let ctors = self
            .constructors
            .iter()
            .flat_map(|c| c.markers().iter().copied());
        fields.chain(methods).chain(ctors)
    }
}

/// 基于显式登记表的成员枚举实现；生成代码或手写代码把类型登记进来。
#[derive(Clone)]
pub struct Registry {
    types: HashMap<Type, TypeInfo>,
    markers: BTreeSet<String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
            markers: BTreeSet::new(),
        };
        registry.register(object_info());
        registry
    }

    pub fn register(&mut self, info: TypeInfo) -> &mut Self {
        for marker in info.markers() {
            self.markers.insert(marker_key(marker).to_string());
        }
        self.types.insert(info.ty, info);
        self
    }

    /// 声明环境里存在某个标记，即使还没有成员使用它。
    pub fn declare_marker(&mut self, marker: &str) -> &mut Self {
        self.markers.insert(marker_key(marker).to_string());
        self
    }

    pub fn contains(&self, ty: Type) -> bool {
        self.types.contains_key(&ty)
    }

    fn collect_fields(&self, ty: Type, project: Option<&Projection>, out: &mut Vec<FieldDef>) {
        let Some(info) = self.types.get(&ty) else {
            return;
        };
        for def in &info.fields {
            out.push(match project {
                Some(p) => def.projected(p),
                None => def.clone(),
            });
        }
        if let Some(base) = info.base.as_ref() {
            let chained = chain_projection(project, &base.project);
            self.collect_fields(base.ty, Some(&chained), out);
        }
    }

    fn collect_methods(&self, ty: Type, project: Option<&Projection>, out: &mut Vec<MethodDef>) {
        let Some(info) = self.types.get(&ty) else {
            return;
        };
        for def in &info.methods {
            out.push(match project {
                Some(p) => def.projected(p),
                None => def.clone(),
            });
        }
        if let Some(base) = info.base.as_ref() {
            let chained = chain_projection(project, &base.project);
            self.collect_methods(base.ty, Some(&chained), out);
        }
    }
}

fn chain_projection(outer: Option<&Projection>, inner: &Projection) -> Projection {
    let Some(outer) = outer else {
        return inner.clone();
    };
    let outer = outer.clone();
    let inner = inner.clone();
    projection(move |subject| (*outer)(subject).and_then(|mid| (*inner)(mid)))
}

fn marker_key(marker: &str) -> &str {
    marker.rsplit("::").next().unwrap_or(marker)
}

fn object_info() -> TypeInfo {
    TypeInfo::of::<Object>()
        .method(MethodDef::new(
            "to_string",
            Vec::new(),
            Type::of::<String>(),
        ))
        .method(MethodDef::new(
            "eq",
            vec![Type::of::<Object>()],
            Type::of::<bool>(),
        ))
        .method(MethodDef::new("hash", Vec::new(), Type::of::<u64>()))
}

impl MarkerEnvironment for Registry {
    fn resolves(&self, marker: &str) -> bool {
        self.markers.contains(marker_key(marker))
    }
}

impl MemberEnumerator for Registry {
    fn constructors_of(&self, ty: Type) -> Vec<Constructor> {
        let Some(info) = self.types.get(&ty) else {
            return Vec::new();
        };
        info.constructors
            .iter()
            .cloned()
            .map(Constructor::from_def)
            .collect()
    }

    fn fields_of(&self, ty: Type) -> Vec<Field> {
        let mut defs = Vec::new();
        self.collect_fields(ty, None, &mut defs);
        defs.into_iter().map(Field::from_def).collect()
    }

    fn methods_of(&self, ty: Type) -> Vec<Method> {
        let mut defs = Vec::new();
        self.collect_methods(ty, None, &mut defs);
        let object = Type::of::<Object>();
        if ty != object {
            if let Some(info) = self.types.get(&object) {
                defs.extend(info.methods.iter().cloned());
            }
        }
        defs.into_iter().map(Method::from_def).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::member::{AccessScope, Args};

    #[derive(Default)]
    struct Base {
        name: String,
    }

    #[derive(Default)]
    struct Middle {
        base: Base,
        size: u32,
    }

    #[derive(Default)]
    struct Leaf {
        middle: Middle,
        flag: bool,
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                TypeInfo::of::<Base>()
                    .field(
                        FieldDef::new("name", |b: &mut Base, v: String| b.name = v)
                            .marked("inject"),
                    )
                    .method(MethodDef::setter(
                        "set_name",
                        |b: &mut Base, v: String| b.name = v,
                    )),
            )
            .register(
                TypeInfo::of::<Middle>()
                    .field(FieldDef::new("size", |m: &mut Middle, v: u32| m.size = v))
                    .extends(|m: &mut Middle| &mut m.base),
            )
            .register(
                TypeInfo::of::<Leaf>()
                    .field(FieldDef::new("flag", |l: &mut Leaf, v: bool| l.flag = v).private())
                    .constructor(ConstructorDef::no_arg("new", Leaf::default))
                    .extends(|l: &mut Leaf| &mut l.middle),
            );
        registry
    }

    #[test]
    fn fields_of_按继承链从派生到基类型列出() {
        let registry = registry();
        let fields = registry.fields_of(Type::of::<Leaf>());
        let names: Vec<_> = fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["flag", "size", "name"]);
        assert_eq!(fields[2].declaring(), Type::of::<Base>());
    }

    #[test]
    fn 继承来的字段通过投影写入基类型部分() {
        let registry = registry();
        let fields = registry.fields_of(Type::of::<Leaf>());
        let mut leaf: Box<Subject> = Box::new(Leaf::default());
        for field in &fields {
            let _scope = AccessScope::open(field);
            let value: crate::Instance = match field.name() {
                "flag" => Arc::new(true),
                "size" => Arc::new(9u32),
                _ => Arc::new(String::from("base")),
            };
            field.write(leaf.as_mut(), value).unwrap();
        }
        let leaf = leaf.downcast::<Leaf>().ok().unwrap();
        assert!(leaf.flag);
        assert_eq!(leaf.middle.size, 9);
        assert_eq!(leaf.middle.base.name, "base");
    }

    #[test]
    fn methods_of_末尾附上object方法_继承方法可调用() {
        let registry = registry();
        let methods = registry.methods_of(Type::of::<Leaf>());
        let names: Vec<_> = methods.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["set_name", "to_string", "eq", "hash"]);
        assert_eq!(methods[1].declaring(), Type::of::<Object>());

        let mut leaf: Box<Subject> = Box::new(Leaf::default());
        let args = Args::new(vec![Arc::new(String::from("via setter"))]);
        methods[0].invoke(leaf.as_mut(), &args).unwrap();
        let leaf = leaf.downcast::<Leaf>().ok().unwrap();
        assert_eq!(leaf.middle.base.name, "via setter");

        let object_methods = registry.methods_of(Type::of::<Object>());
        assert_eq!(object_methods.len(), 3);
    }

    #[test]
    fn 构造函数不继承_未登记类型没有成员() {
        let registry = registry();
        assert_eq!(registry.constructors_of(Type::of::<Leaf>()).len(), 1);
        assert!(registry.constructors_of(Type::of::<Middle>()).is_empty());
        assert!(registry.fields_of(Type::of::<u8>()).is_empty());
        assert!(!registry.contains(Type::of::<u8>()));
    }

    #[test]
    fn 标记环境_覆盖成员携带与显式声明() {
        let mut registry = registry();
        assert!(registry.resolves("inject"));
        assert!(registry.resolves("decoy::inject"));
        assert!(!registry.resolves("autowired"));
        registry.declare_marker("autowired");
        assert!(registry.resolves("autowired"));
    }

    #[test]
    fn 每次枚举返回新的句柄() {
        let registry = registry();
        let first = registry.fields_of(Type::of::<Leaf>());
        crate::member::Accessible::set_accessible(&first[0], true);
        let second = registry.fields_of(Type::of::<Leaf>());
        assert!(!crate::member::Accessible::is_accessible(&second[0]));
    }
}
