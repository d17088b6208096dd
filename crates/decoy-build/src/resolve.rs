use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

use crate::model::{ScanOut, Subject, TypeRef};

pub(crate) fn build_subject_name_index(
    subjects: &BTreeMap<String, Subject>,
) -> BTreeMap<String, Vec<String>> {
    let mut index = BTreeMap::<String, Vec<String>>::new();
    for s in subjects.values() {
        index
            .entry(s.struct_name.clone())
            .or_default()
            .push(s.type_key.clone());
    }
    for v in index.values_mut() {
        v.sort();
    }
    index
}

/// 精确路径优先，其次按唯一的类型名匹配；找不到返回 `None`（说明不是被测类型）。
pub(crate) fn resolve_type_ref(
    r: &TypeRef,
    subjects: &BTreeMap<String, Subject>,
    index: &BTreeMap<String, Vec<String>>,
) -> Result<Option<String>> {
    if subjects.contains_key(&r.key) {
        return Ok(Some(r.key.clone()));
    }
    let Some(name) = r.simple_name.as_ref() else {
        return Ok(None);
    };
    let Some(cands) = index.get(name) else {
        return Ok(None);
    };
    if cands.len() == 1 {
        return Ok(Some(cands[0].clone()));
    }
    Err(anyhow!(
        "类型 {} 存在多个同名被测类型（{}），请在 impl 里使用完整路径避免歧义",
        name,
        cands.join(", ")
    ))
}

/// 把 impl 块与 `Default` 实现并入对应的被测类型。
pub(crate) fn merge_subjects(scan: ScanOut) -> Result<BTreeMap<String, Subject>> {
    let mut subjects = BTreeMap::<String, Subject>::new();
    for def in scan.subjects {
        if subjects.contains_key(&def.type_key) {
            return Err(anyhow!("被测类型重复：{}", def.type_key));
        }
        subjects.insert(
            def.type_key.clone(),
            Subject {
                type_key: def.type_key,
                struct_name: def.struct_name,
                fields: def.fields,
                extends: def.extends,
                methods: Vec::new(),
                ctors: Vec::new(),
                has_default: def.derives_default,
            },
        );
    }

    let index = build_subject_name_index(&subjects);

    for raw in scan.impls {
        let Some(key) = resolve_type_ref(&raw.self_ty, &subjects, &index)? else {
            continue;
        };
        let subject = subjects
            .get_mut(&key)
            .ok_or_else(|| anyhow!("缺少被测类型: {key}"))?;
        for m in raw.methods {
            if subject.methods.iter().any(|x| x.name == m.name) {
                return Err(anyhow!("被测类型 {key} 的注入方法重复：{}", m.name));
            }
            subject.methods.push(m);
        }
        for c in raw.ctors {
            if subject.ctors.iter().any(|x| x.name == c.name) {
                return Err(anyhow!("被测类型 {key} 的构造函数重复：{}", c.name));
            }
            subject.ctors.push(c);
        }
    }

    for r in scan.default_impls {
        let Some(key) = resolve_type_ref(&r, &subjects, &index)? else {
            continue;
        };
        if let Some(subject) = subjects.get_mut(&key) {
            subject.has_default = true;
        }
    }

    Ok(subjects)
}
