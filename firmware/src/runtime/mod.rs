use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::Timer;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::ble::controller::BleConnector;
use remote_core::config::OrchestratorConfig;
use static_cell::StaticCell;
use trouble_host::prelude::ExternalController;

use crate::ble::{AdvertisingChannel, BleRequestQueue, HidChannel, LinkFlag};
use crate::config::DeploymentConfig;
use crate::events::EventQueue;
use crate::mqtt::{MqttPublisher, SessionFlag, StatusQueue};
use crate::orchestrator::{FirmwareContext, RemotePump};

mod ble_task;
mod indicator_task;
mod mqtt_task;
mod net_task;
mod orchestrator_task;
mod wifi_task;

esp_bootloader_esp_idf::esp_app_desc!();

/// Outstanding HCI commands buffered by the BLE controller.
const BLE_SLOTS: usize = 20;
const NET_SOCKETS: usize = 3;

pub(super) static CONFIG: DeploymentConfig = DeploymentConfig::from_env();
pub(super) static EVENTS: EventQueue = EventQueue::new();
pub(super) static BLE_REQUESTS: BleRequestQueue = BleRequestQueue::new();
pub(super) static STATUS_OUTBOX: StatusQueue = StatusQueue::new();
pub(super) static LINK: LinkFlag = LinkFlag::new();
pub(super) static SESSION: SessionFlag = SessionFlag::new();

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<NET_SOCKETS>> = StaticCell::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupts = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupts.software_interrupt0);
    defmt::info!("projector remote starting as {}", CONFIG.device_name);

    let radio: &'static esp_radio::Controller<'static> =
        RADIO.init(esp_radio::init().expect("radio init"));

    let (wifi, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("wifi init");
    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    let connector =
        BleConnector::new(radio, peripherals.BT, Default::default()).expect("ble init");
    let controller: ExternalController<_, BLE_SLOTS> = ExternalController::new(connector);

    let context = FirmwareContext::new(
        OrchestratorConfig::new(),
        AdvertisingChannel::new(BLE_REQUESTS.sender()),
        HidChannel::new(BLE_REQUESTS.sender(), &LINK),
        MqttPublisher::new(STATUS_OUTBOX.sender(), &SESSION),
    );
    let pump = RemotePump::new(context, EVENTS.receiver());

    spawner
        .spawn(orchestrator_task::run(pump))
        .expect("failed to spawn orchestrator task");
    spawner
        .spawn(ble_task::run(controller))
        .expect("failed to spawn BLE task");
    spawner
        .spawn(wifi_task::run(wifi))
        .expect("failed to spawn WiFi task");
    spawner
        .spawn(net_task::run(runner))
        .expect("failed to spawn network task");
    spawner
        .spawn(mqtt_task::run(stack))
        .expect("failed to spawn MQTT task");
    spawner
        .spawn(indicator_task::run(
            Output::new(peripherals.GPIO12, Level::Low, OutputConfig::default()),
            Output::new(peripherals.GPIO13, Level::High, OutputConfig::default()),
        ))
        .expect("failed to spawn indicator task");

    loop {
        Timer::after_secs(3600).await;
    }
}
