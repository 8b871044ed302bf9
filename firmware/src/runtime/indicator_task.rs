use embassy_time::{Duration, Ticker};
use esp_hal::gpio::{Level, Output};

use crate::status;

const REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// Mirrors the shared status onto the receiver and WiFi LEDs.
#[embassy_executor::task]
pub async fn run(mut receiver: Output<'static>, mut wifi_down: Output<'static>) -> ! {
    let mut ticker = Ticker::every(REFRESH_PERIOD);
    loop {
        let levels = status::indicators();
        receiver.set_level(Level::from(levels.receiver));
        wifi_down.set_level(Level::from(levels.wifi_down));
        ticker.next().await;
    }
}
