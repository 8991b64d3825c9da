fn main() -> anyhow::Result<()> {
    macchm::cli::run_cli()
}
