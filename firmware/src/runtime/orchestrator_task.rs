use crate::orchestrator::RemotePump;

#[embassy_executor::task]
pub async fn run(pump: RemotePump<'static>) -> ! {
    pump.run().await
}
