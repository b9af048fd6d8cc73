#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examline::run().await {
        eprintln!("examline fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
