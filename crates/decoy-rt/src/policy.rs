use std::collections::BTreeSet;

use tracing::debug;

use crate::error::InjectError;
use crate::member::{Member, MemberKind};

/// 自动探测注入标记时依次尝试的名字；第一个在环境中可用的胜出。
pub const WELL_KNOWN_MARKERS: &[&str] = &["inject", "autowired", "resource", "wired"];

/// 注入点策略：判断一个成员是否是注入点。
pub trait InjectionPoint: Send + Sync {
    fn is_injectable(&self, member: Member<'_>) -> bool;
}

impl<F> InjectionPoint for F
where
    F: Fn(Member<'_>) -> bool + Send + Sync,
{
    fn is_injectable(&self, member: Member<'_>) -> bool {
        self(member)
    }
}

/// 标记名是否在当前环境中存在。
pub trait MarkerEnvironment {
    fn resolves(&self, marker: &str) -> bool;
}

impl MarkerEnvironment for Vec<&str> {
    fn resolves(&self, marker: &str) -> bool {
        self.iter().any(|m| same_marker(m, marker))
    }
}

/// 带任一配置标记的成员就是注入点；可以按成员种类整体排除。
#[derive(Debug, Clone)]
pub struct MarkedInjectionPoint {
    markers: Vec<String>,
    excluded: BTreeSet<MemberKind>,
}

impl MarkedInjectionPoint {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
            excluded: BTreeSet::new(),
        }
    }

    pub fn excluding(mut self, kind: MemberKind) -> Self {
        self.excluded.insert(kind);
        self
    }

    pub fn detect<E: MarkerEnvironment + ?Sized>(env: &E) -> Result<Self, InjectError> {
        Self::detect_from(env, WELL_KNOWN_MARKERS)
    }

    pub fn detect_from<E: MarkerEnvironment + ?Sized>(
        env: &E,
        candidates: &[&str],
    ) -> Result<Self, InjectError> {
        let Some(found) = candidates.iter().find(|m| env.resolves(m)) else {
            return Err(InjectError::NoMarker {
                tried: candidates.iter().map(|m| m.to_string()).collect(),
            });
        };
        debug!(marker = *found, "自动探测到注入标记");
        Ok(Self::new([*found]))
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl InjectionPoint for MarkedInjectionPoint {
    fn is_injectable(&self, member: Member<'_>) -> bool {
        if self.excluded.contains(&member.kind()) {
            return false;
        }
        member
            .markers()
            .iter()
            .any(|m| self.markers.iter().any(|c| same_marker(c, m)))
    }
}

fn same_marker(a: &str, b: &str) -> bool {
    let last = |s: &str| s.rsplit("::").next().unwrap_or(s).to_string();
    last(a) == last(b)
}
