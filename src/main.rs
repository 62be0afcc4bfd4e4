#[tokio::main]
async fn main() {
    if let Err(e) = courier_server::run().await {
        eprintln!("server error: {e:#}");
        std::process::exit(1);
    }
}
