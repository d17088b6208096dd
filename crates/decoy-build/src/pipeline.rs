use std::{collections::BTreeSet, fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::{
    codegen::{generate_code, minimal_generated_code},
    model::WELL_KNOWN_MARKERS,
    resolve::merge_subjects,
    scan::scan_crate,
};

/// 逗号分隔的额外标记名，只作用于方法与构造函数。
pub(crate) const EXTRA_MARKERS_ENV: &str = "DECOY_EXTRA_MARKERS";

pub(crate) fn markers_from_env() -> Vec<String> {
    let mut out: Vec<String> = WELL_KNOWN_MARKERS.iter().map(|m| m.to_string()).collect();
    let extra = std::env::var(EXTRA_MARKERS_ENV).unwrap_or_default();
    for m in extra.split(',').map(str::trim).filter(|m| !m.is_empty()) {
        if !out.iter().any(|x| x == m) {
            out.push(m.to_string());
        }
    }
    out
}

pub(crate) fn generate() -> Result<()> {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let out_file = out_dir.join("decoy_gen.rs");

    let markers = markers_from_env();
    let mut rerun_if_changed = BTreeSet::<PathBuf>::new();
    let (scan, mut files) = scan_crate(&manifest_dir, &markers)?;
    rerun_if_changed.append(&mut files);

    let contracts = scan.contracts.clone();
    let subjects = merge_subjects(scan)?;
    for s in subjects.values() {
        if s.ctors.is_empty() && !s.has_default {
            println!(
                "cargo:warning=decoy-build: 被测类型 {} 没有可登记的构造函数（无参构造函数、带标记的构造函数或 Default），注入时会失败",
                s.type_key.replace(' ', "")
            );
        }
    }

    let generated = if subjects.is_empty() && contracts.is_empty() {
        minimal_generated_code()?
    } else {
        generate_code(&subjects, &contracts)?
    };
    fs::write(&out_file, generated)
        .with_context(|| format!("写入生成代码失败: {}", out_file.display()))?;

    for path in rerun_if_changed {
        println!("cargo:rerun-if-changed={}", path.display());
    }
    println!("cargo:rerun-if-env-changed={EXTRA_MARKERS_ENV}");

    Ok(())
}
