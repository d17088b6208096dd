use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::double::DoubleDescriptor;
use crate::error::InjectError;
use crate::factory::DoubleFactory;
use crate::types::Type;

/// setter 命名约定：去掉前缀得到属性名。
///
/// 前缀以 `_` 结尾（默认 `set_`）时余下部分原样作为属性名；否则按驼峰约定把首字母转成小写
/// （`setName` -> `name`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetterConvention {
    prefix: String,
}

impl Default for SetterConvention {
    fn default() -> Self {
        Self {
            prefix: "set_".to_string(),
        }
    }
}

impl SetterConvention {
    /// 空前缀会让任何名字都被当成 setter，直接拒绝。
    pub fn new(prefix: impl Into<String>) -> Result<Self, InjectError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(InjectError::EmptySetterPrefix);
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_setter(&self, name: &str) -> bool {
        self.property_name(name).is_some()
    }

    pub fn property_name(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            return None;
        }
        if self.prefix.ends_with('_') {
            return Some(rest.to_string());
        }
        let mut chars = rest.chars();
        let first = chars.next()?;
        Some(first.to_lowercase().chain(chars).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Field,
    MethodParameter,
    ConstructorParameter,
}

/// 一个待填充的注入槽位：声明类型，加上（字段名或方法名作为）槽位名。构造函数参数没有名字。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSlot {
    kind: SlotKind,
    declared_type: Type,
    name: Option<String>,
    declaring: Type,
}

impl InjectionSlot {
    pub fn field(name: &str, declared_type: Type, declaring: Type) -> Self {
        Self {
            kind: SlotKind::Field,
            declared_type,
            name: Some(name.to_string()),
            declaring,
        }
    }

    pub fn method_parameter(method: &str, declared_type: Type, declaring: Type) -> Self {
        Self {
            kind: SlotKind::MethodParameter,
            declared_type,
            name: Some(method.to_string()),
            declaring,
        }
    }

    pub fn constructor_parameter(declared_type: Type, declaring: Type) -> Self {
        Self {
            kind: SlotKind::ConstructorParameter,
            declared_type,
            name: None,
            declaring,
        }
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn declared_type(&self) -> Type {
        self.declared_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn declaring(&self) -> Type {
        self.declaring
    }
}

impl fmt::Display for InjectionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, self.name.as_deref()) {
            (SlotKind::ConstructorParameter, _) | (_, None) => f.write_str("构造函数参数"),
            (_, Some(name)) => f.write_str(name),
        }
    }
}

/// 为注入槽位挑选替身，并记录本次注入用到的全部替身。
///
/// 查找顺序：同名且类型相同 -> setter 名推出的属性名且类型相同 -> 同类型 -> 现造一个。
/// 名字命中但类型不符时继续往后找。现造的替身不缓存，两个槽位各得一个。
pub struct DoubleRepository<'f> {
    by_name: HashMap<String, DoubleDescriptor>,
    by_type: HashMap<Type, DoubleDescriptor>,
    factory: &'f dyn DoubleFactory,
    setters: SetterConvention,
    used: Vec<DoubleDescriptor>,
}

impl<'f> DoubleRepository<'f> {
    pub fn new(
        supplied: &[DoubleDescriptor],
        factory: &'f dyn DoubleFactory,
        setters: SetterConvention,
    ) -> Self {
        let mut by_name = HashMap::new();
        let mut by_type = HashMap::new();
        for descriptor in supplied {
            if let Some(name) = descriptor.name() {
                by_name.insert(name.to_string(), descriptor.clone());
            }
            by_type
                .entry(descriptor.declared_type())
                .or_insert_with(|| descriptor.clone());
        }
        Self {
            by_name,
            by_type,
            factory,
            setters,
            used: Vec::new(),
        }
    }

    pub fn assign(&mut self, slot: &InjectionSlot) -> Result<DoubleDescriptor, InjectError> {
        let descriptor = match self.lookup(slot) {
            Some(found) => found,
            None => self.fabricate(slot)?,
        };
        if !self.used.iter().any(|d| d.same_as(&descriptor)) {
            self.used.push(descriptor.clone());
        }
        Ok(descriptor)
    }

    /// 本次注入用到的替身，按首次使用的顺序。
    pub fn used(&self) -> &[DoubleDescriptor] {
        &self.used
    }

    pub fn into_used(self) -> Vec<DoubleDescriptor> {
        self.used
    }

    fn lookup(&self, slot: &InjectionSlot) -> Option<DoubleDescriptor> {
        let ty = slot.declared_type();
        if let Some(name) = slot.name() {
            if let Some(found) = self.named(name, ty) {
                debug!(slot = %slot, ty = %ty, "按名称匹配到替身");
                return Some(found);
            }
            if let Some(property) = self.setters.property_name(name) {
                if let Some(found) = self.named(&property, ty) {
                    debug!(slot = %slot, property = %property, ty = %ty, "按 setter 名匹配到替身");
                    return Some(found);
                }
            }
        }
        let found = self.by_type.get(&ty).cloned()?;
        debug!(slot = %slot, ty = %ty, "按类型匹配到替身");
        Some(found)
    }

    fn named(&self, name: &str, ty: Type) -> Option<DoubleDescriptor> {
        self.by_name
            .get(name)
            .filter(|d| d.declared_type() == ty)
            .cloned()
    }

    fn fabricate(&self, slot: &InjectionSlot) -> Result<DoubleDescriptor, InjectError> {
        let ty = slot.declared_type();
        let double = self
            .factory
            .create_double(ty)
            .map_err(|source| InjectError::Fabrication {
                ty,
                slot: slot.to_string(),
                source: source.into(),
            })?;
        debug!(slot = %slot, ty = %ty, "没有现成替身，新建一个");
        Ok(DoubleDescriptor::new(
            double,
            slot.name().map(str::to_string),
            ty,
        ))
    }
}
