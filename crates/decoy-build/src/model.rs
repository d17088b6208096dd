/// 默认识别的注入标记，与 `decoy_rt::WELL_KNOWN_MARKERS` 保持一致。
pub(crate) const WELL_KNOWN_MARKERS: &[&str] = &["inject", "autowired", "resource", "wired"];

#[derive(Debug, Clone)]
pub(crate) struct ScanCtx {
    pub(crate) module_path: Vec<String>,
    pub(crate) markers: Vec<String>,
}

impl ScanCtx {
    pub(crate) fn at_root(&self) -> bool {
        self.module_path.is_empty()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TypeRef {
    pub(crate) key: String,
    pub(crate) simple_name: Option<String>,
}

/// 成员对生成代码（位于 crate 根下的 `decoy_gen` 模块）的可见性。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reach {
    /// `pub`：登记为公开成员。
    Public,
    /// `pub(crate)` 等受限可见性，或位于 crate 根模块的私有成员：生成代码可以访问，但登记为私有。
    Restricted,
    /// 子模块里的私有成员：生成代码无法访问。
    Hidden,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldRaw {
    pub(crate) name: String,
    pub(crate) markers: Vec<String>,
    pub(crate) reach: Reach,
}

#[derive(Debug, Clone)]
pub(crate) struct SubjectDef {
    pub(crate) type_key: String,
    pub(crate) struct_name: String,
    pub(crate) fields: Vec<FieldRaw>,
    pub(crate) extends: Option<String>,
    pub(crate) derives_default: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct MethodRaw {
    pub(crate) name: String,
    pub(crate) markers: Vec<String>,
    pub(crate) reach: Reach,
}

#[derive(Debug, Clone)]
pub(crate) struct CtorRaw {
    pub(crate) name: String,
    pub(crate) markers: Vec<String>,
    pub(crate) reach: Reach,
    pub(crate) arity: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct InherentImplRaw {
    pub(crate) self_ty: TypeRef,
    pub(crate) methods: Vec<MethodRaw>,
    pub(crate) ctors: Vec<CtorRaw>,
}

#[derive(Debug, Clone)]
pub(crate) struct ContractDef {
    pub(crate) trait_key: String,
}

#[derive(Default)]
pub(crate) struct ScanOut {
    pub(crate) subjects: Vec<SubjectDef>,
    pub(crate) impls: Vec<InherentImplRaw>,
    pub(crate) default_impls: Vec<TypeRef>,
    pub(crate) contracts: Vec<ContractDef>,
}

/// 合并了 impl 块之后的被测类型。
#[derive(Debug, Clone)]
pub(crate) struct Subject {
    pub(crate) type_key: String,
    pub(crate) struct_name: String,
    pub(crate) fields: Vec<FieldRaw>,
    pub(crate) extends: Option<String>,
    pub(crate) methods: Vec<MethodRaw>,
    pub(crate) ctors: Vec<CtorRaw>,
    pub(crate) has_default: bool,
}

impl Subject {
    /// 没有显式的无参构造函数时，用 `Default::default` 兜底。
    pub(crate) fn needs_default_ctor(&self) -> bool {
        self.has_default && !self.ctors.iter().any(|c| c.arity == 0)
    }
}
