use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};

use super::CONFIG;
use crate::status;

const RETRY_DELAY: Duration = Duration::from_secs(5);
const POLL_PERIOD: Duration = Duration::from_secs(2);

/// Joins the configured network and rejoins whenever the association drops.
#[embassy_executor::task]
pub async fn run(mut controller: WifiController<'static>) -> ! {
    loop {
        if !matches!(controller.is_started(), Ok(true)) {
            let client = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(CONFIG.wifi_ssid.into())
                    .with_password(CONFIG.wifi_password.into()),
            );
            if let Err(err) = controller.set_config(&client) {
                defmt::error!("wifi: rejected config ({})", defmt::Debug2Format(&err));
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            if let Err(err) = controller.start_async().await {
                defmt::warn!("wifi: start failed ({})", defmt::Debug2Format(&err));
                Timer::after(RETRY_DELAY).await;
                continue;
            }
        }

        defmt::info!("wifi: joining {}", CONFIG.wifi_ssid);
        if let Err(err) = controller.connect_async().await {
            defmt::warn!("wifi: join failed ({})", defmt::Debug2Format(&err));
            Timer::after(RETRY_DELAY).await;
            continue;
        }
        status::record_wifi_up(true);
        defmt::info!("wifi: joined");

        while matches!(controller.is_connected(), Ok(true)) {
            Timer::after(POLL_PERIOD).await;
        }

        status::record_wifi_up(false);
        defmt::warn!("wifi: association lost");
        if let Err(err) = controller.disconnect_async().await {
            defmt::debug!("wifi: disconnect ({})", defmt::Debug2Format(&err));
        }
        Timer::after(RETRY_DELAY).await;
    }
}
