#[tokio::main]
async fn main() {
    guest_server::run().await;
}
