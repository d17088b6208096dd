fn main() -> anyhow::Result<()> {
    decoy_build::generate()
}
