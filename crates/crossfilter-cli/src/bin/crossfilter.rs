fn main() -> anyhow::Result<()> {
    crossfilter_cli::cli::run()
}
