use anyhow::Result;

fn main() -> Result<()> {
    labgrade::cli::run()
}
