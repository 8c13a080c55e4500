use labwatch::error::LabwatchError;

#[tokio::main]
async fn main() -> Result<(), LabwatchError> {
    labwatch::app::run().await
}
