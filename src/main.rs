#[tokio::main]
async fn main() {
    if let Err(err) = fenceclock_lib::cli::run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
