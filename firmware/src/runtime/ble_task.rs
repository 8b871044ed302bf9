use esp_radio::ble::controller::BleConnector;
use trouble_host::prelude::ExternalController;

use super::{BLE_REQUESTS, BLE_SLOTS, CONFIG, EVENTS, LINK};
use crate::ble::server;

#[embassy_executor::task]
pub async fn run(controller: ExternalController<BleConnector<'static>, BLE_SLOTS>) -> ! {
    server::run(
        controller,
        CONFIG.device_name,
        BLE_REQUESTS.receiver(),
        EVENTS.sender(),
        &LINK,
    )
    .await
}
