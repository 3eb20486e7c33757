//! Email Worker Service - Entry Point
//!
//! Background worker that drains the in-process email dispatch queue.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    email_worker::run().await
}
