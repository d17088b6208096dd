use thiserror::Error;

use crate::types::Type;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 成员读写、调用层面的失败。
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("成员 {member} 不是公开成员，且未处于访问作用域内")]
    Inaccessible { member: String },
    #[error("对象类型不匹配：期望 {expected}")]
    SubjectType { expected: &'static str },
    #[error("第 {index} 个参数类型不匹配：期望 {expected}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
    },
    #[error("缺少第 {index} 个参数")]
    MissingArgument { index: usize },
    #[error("方法 {member} 只有声明，没有可调用的实现")]
    NotInvocable { member: String },
    #[error("成员执行时报错：{0}")]
    Raised(#[source] BoxError),
}

impl AccessError {
    pub fn raised(err: impl Into<BoxError>) -> Self {
        Self::Raised(err.into())
    }
}

/// 一次注入过程中可能出现的全部错误。任何一个都会让整次注入失败，不返回半成品。
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("{subject} 有多个可注入的构造函数，无法选择")]
    AmbiguousConstructors { subject: Type },

    #[error("{subject} 没有可用的构造函数（无参或唯一可注入）")]
    NoUsableConstructor { subject: Type },

    #[error(
        "无法确定注入点标记：依次尝试了 {} 均不可用；请显式配置标记，或提供自定义的 InjectionPoint",
        .tried.join(", ")
    )]
    NoMarker { tried: Vec<String> },

    #[error("无法为 [{slot}] 创建类型为 {ty} 的替身")]
    Fabrication {
        ty: Type,
        slot: String,
        #[source]
        source: BoxError,
    },

    #[error("被测类型 {subject} 实例化失败")]
    Instantiation {
        subject: Type,
        #[source]
        source: AccessError,
    },

    #[error("向被测类型 {subject} 的成员 {member} 注入失败")]
    Injection {
        subject: Type,
        member: String,
        #[source]
        source: AccessError,
    },

    #[error("当前测试尚未初始化：请先调用 instance_for_testing")]
    NotInitialized,

    #[error("setter 前缀不能为空")]
    EmptySetterPrefix,

    #[error("返回值类型 {actual} 与请求的 {expected} 不一致")]
    ReturnTypeMismatch { expected: Type, actual: Type },
}
