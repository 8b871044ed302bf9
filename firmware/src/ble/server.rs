//! HID-over-GATT peripheral built on `trouble-host`.

use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use remote_core::beacon::AdvertisingPayload;
use remote_core::context::RemoteEvent;
use remote_core::hid::HID_REPORT_LEN;
use remote_core::link::{LinkEvent, PeerAddress};
use trouble_host::prelude::*;

use super::{
    AD_TYPE_APPEARANCE, AD_TYPE_INCOMPLETE_SERVICE_UUIDS16, ADVERTISED_SERVICES,
    ADVERTISING_DATA_MAX, AdvertisingPlan, BleRequestReceiver, HID_INFORMATION, HID_REPORT_MAP,
    KEYBOARD_APPEARANCE, LinkFlag, REPORT_REFERENCE, advertised_name,
};
use crate::config::DEVICE_ADDRESS;
use crate::events::EventSender;

const CONNECTIONS_MAX: usize = 1;
const L2CAP_CHANNELS_MAX: usize = 2;

const ADVERTISING_FLAGS: u8 = LE_LIMITED_DISCOVERABLE | BR_EDR_NOT_SUPPORTED;
/// 100 ms advertising interval.
const ADVERTISING_INTERVAL: embassy_time::Duration = embassy_time::Duration::from_millis(100);

#[gatt_server]
struct RemoteServer {
    hid: HidService,
    battery: BatteryService,
    device_info: DeviceInformationService,
}

#[gatt_service(uuid = service::HUMAN_INTERFACE_DEVICE)]
struct HidService {
    #[characteristic(uuid = characteristic::HID_INFORMATION, read, value = HID_INFORMATION)]
    information: [u8; 4],
    #[characteristic(uuid = characteristic::REPORT_MAP, read, value = HID_REPORT_MAP)]
    report_map: [u8; 144],
    #[characteristic(uuid = characteristic::HID_CONTROL_POINT, write_without_response, value = 0)]
    control_point: u8,
    #[characteristic(uuid = characteristic::PROTOCOL_MODE, read, write_without_response, value = 1)]
    protocol_mode: u8,
    #[descriptor(uuid = descriptors::REPORT_REFERENCE, read, value = REPORT_REFERENCE)]
    #[characteristic(uuid = characteristic::REPORT, read, notify, value = [0; HID_REPORT_LEN])]
    input_report: [u8; HID_REPORT_LEN],
}

#[gatt_service(uuid = service::BATTERY)]
struct BatteryService {
    #[characteristic(uuid = characteristic::BATTERY_LEVEL, read, notify, value = 100)]
    level: u8,
}

#[gatt_service(uuid = service::DEVICE_INFORMATION)]
struct DeviceInformationService {
    /// Vendor source USB-IF, generic vendor and product, version 1.0.
    #[characteristic(uuid = characteristic::PNP_ID, read, value = [0x02, 0x8a, 0x24, 0x66, 0x82, 0x01, 0x00])]
    pnp_id: [u8; 7],
}

/// Runs the host stack, advertising and the accepted connection forever.
pub async fn run<C>(
    controller: C,
    name: &'static str,
    requests: BleRequestReceiver<'static>,
    events: EventSender<'static>,
    link: &'static LinkFlag,
) -> !
where
    C: Controller,
{
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(PeerAddress::new(DEVICE_ADDRESS).to_le_bytes()));
    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let Ok(server) = RemoteServer::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name,
        appearance: &appearance::human_interface_device::KEYBOARD,
    })) else {
        defmt::panic!("ble: attribute table does not fit");
    };

    let mut plan = AdvertisingPlan::new();
    join(host_task(runner), async {
        loop {
            if !plan.is_enabled() {
                let request = requests.receive().await;
                if plan.apply(request).is_some() {
                    log_report_dropped();
                }
                continue;
            }

            let advertiser = match advertise(name, &mut peripheral, plan.payload()).await {
                Ok(advertiser) => advertiser,
                Err(err) => {
                    defmt::warn!("ble: advertising failed ({})", defmt::Debug2Format(&err));
                    embassy_time::Timer::after_secs(1).await;
                    continue;
                }
            };

            // A request changing the plan drops the advertiser, which stops
            // advertising; the next pass restarts it with the new payload.
            let conn = match select(advertiser.accept(), requests.receive()).await {
                Either::First(Ok(conn)) => conn,
                Either::First(Err(err)) => {
                    defmt::warn!("ble: accept failed ({})", defmt::Debug2Format(&err));
                    continue;
                }
                Either::Second(request) => {
                    if plan.apply(request).is_some() {
                        log_report_dropped();
                    }
                    continue;
                }
            };

            let peer = peer_address(conn.peer_address().raw());
            if !plan.admits(peer) {
                defmt::info!("ble: refusing {}", defmt::Display2Format(&peer));
                conn.disconnect();
                continue;
            }

            let conn = match conn.with_attribute_server(&server) {
                Ok(conn) => conn,
                Err(err) => {
                    defmt::warn!("ble: gatt attach failed ({})", defmt::Debug2Format(&err));
                    continue;
                }
            };

            link.set(true);
            events.send(RemoteEvent::Link(LinkEvent::Connected(peer))).await;
            serve(&server, &conn, &mut plan, &requests).await;
            link.set(false);
            events.send(RemoteEvent::Link(LinkEvent::Disconnected)).await;
        }
    })
    .await;

    unreachable!()
}

async fn host_task<C, P>(mut runner: Runner<'_, C, P>)
where
    C: Controller,
    P: PacketPool,
{
    loop {
        if let Err(err) = runner.run().await {
            defmt::error!("ble: host runner stopped ({})", defmt::Debug2Format(&err));
        }
    }
}

async fn advertise<'values, C>(
    name: &str,
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    payload: AdvertisingPayload,
) -> Result<Advertiser<'values, C, DefaultPacketPool>, BleHostError<C::Error>>
where
    C: Controller,
{
    let (name, complete) = advertised_name(name);
    let identity = match payload.manufacturer_data() {
        Some(data) => AdStructure::ManufacturerSpecificData {
            company_identifier: u16::from_le_bytes([data[0], data[1]]),
            payload: &data[2..],
        },
        None if complete => AdStructure::CompleteLocalName(name),
        None => AdStructure::ShortenedLocalName(name),
    };

    let mut adv_data = [0; ADVERTISING_DATA_MAX];
    let adv_len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(ADVERTISING_FLAGS),
            AdStructure::Unknown {
                ty: AD_TYPE_APPEARANCE,
                data: &KEYBOARD_APPEARANCE,
            },
            AdStructure::Unknown {
                ty: AD_TYPE_INCOMPLETE_SERVICE_UUIDS16,
                data: &ADVERTISED_SERVICES,
            },
            identity,
        ],
        &mut adv_data[..],
    )?;

    let params = AdvertisementParameters {
        interval_min: ADVERTISING_INTERVAL,
        interval_max: ADVERTISING_INTERVAL,
        ..Default::default()
    };
    let advertiser = peripheral
        .advertise(
            &params,
            Advertisement::ConnectableScannableUndirected {
                adv_data: &adv_data[..adv_len],
                scan_data: &[],
            },
        )
        .await?;
    defmt::debug!("ble: advertising {}", defmt::Display2Format(&payload));
    Ok(advertiser)
}

/// Serves GATT traffic and queued reports until the link drops.
async fn serve<P>(
    server: &RemoteServer<'_>,
    conn: &GattConnection<'_, '_, P>,
    plan: &mut AdvertisingPlan,
    requests: &BleRequestReceiver<'static>,
) where
    P: PacketPool,
{
    loop {
        match select(conn.next(), requests.receive()).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                defmt::info!("ble: disconnected ({})", defmt::Debug2Format(&reason));
                return;
            }
            Either::First(GattConnectionEvent::Gatt { event }) => match event.accept() {
                Ok(reply) => reply.send().await,
                Err(err) => defmt::warn!("ble: gatt reply failed ({})", defmt::Debug2Format(&err)),
            },
            Either::First(_) => {}
            Either::Second(request) => {
                let Some(report) = plan.apply(request) else {
                    continue;
                };
                if let Err(err) = server
                    .hid
                    .input_report
                    .notify(conn, report.as_bytes())
                    .await
                {
                    defmt::warn!("ble: report notify failed ({})", defmt::Debug2Format(&err));
                } else {
                    defmt::info!("ble: report {}", defmt::Display2Format(&report));
                }
            }
        }
    }
}

/// Host stack addresses are little-endian.
fn peer_address(raw: &[u8]) -> PeerAddress {
    let mut bytes = [0; 6];
    let len = raw.len().min(bytes.len());
    bytes[..len].copy_from_slice(&raw[..len]);
    PeerAddress::from_le_bytes(bytes)
}

fn log_report_dropped() {
    defmt::warn!("ble: report dropped, no receiver connected");
}
