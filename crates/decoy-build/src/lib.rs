#![doc = include_str!("../README.md")]

mod codegen;
mod model;
mod pipeline;
mod resolve;
mod scan;
mod type_util;

/// 在 `build.rs` 里调用：扫描当前 crate 的 `src/`，写出 `$OUT_DIR/decoy_gen.rs`。
pub fn generate() -> anyhow::Result<()> {
    pipeline::generate()
}
