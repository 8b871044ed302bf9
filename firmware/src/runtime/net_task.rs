use embassy_net::Runner;
use esp_radio::wifi::WifiDevice;

#[embassy_executor::task]
pub async fn run(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}
