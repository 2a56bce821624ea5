//! In-process mock gateway
//!
//! Answers verbatim command bytes with canned replies over a
//! `tokio::io::duplex` pair. Leading whitespace between commands is
//! ignored; unrecognized bytes accumulate until a command matches.

#![allow(dead_code)]

use std::time::Duration;

use raven_api::{RavenDevice, SessionConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEVICE_MAC: &str = "0x0123456789ABCDEF";
pub const METER_MAC: &str = "0xFEDCBA9876543210";

pub const GET_METER_LIST: &[u8] = b"<Command><Name>get_meter_list</Name></Command>";
pub const GET_DEVICE_INFO: &[u8] = b"<Command><Name>get_device_info</Name></Command>";
pub const GET_CURRENT_PRICE: &[u8] = b"<Command><Name>get_current_price</Name>\
    <MeterMacId>0xFEDCBA9876543210</MeterMacId></Command>";
pub const GET_SUMMATION: &[u8] = b"<Command><Name>get_current_summation_delivered</Name>\
    <MeterMacId>0xFEDCBA9876543210</MeterMacId></Command>";

pub const METER_LIST: &[u8] = b"<MeterList>\r\n\
    <DeviceMacId>0x0123456789abcdef</DeviceMacId>\r\n\
    </MeterList>\r\n";

pub const PRICE_CLUSTER: &[u8] = b"<PriceCluster>\
    <DeviceMacId>0x0123456789ABCDEF</DeviceMacId>\
    <MeterMacId>0xFEDCBA9876543210</MeterMacId>\
    <TimeStamp>0x29bd58a7</TimeStamp>\
    <Price>0xc8</Price>\
    <Currency>0x348</Currency>\
    <TrailingDigits>0x03</TrailingDigits>\
    <Tier>0x08</Tier>\
    <TierLabel>Set by User</TierLabel>\
    <RateLabel>Set by User</RateLabel>\
    </PriceCluster>";

pub const SUMMATION: &[u8] = b"<CurrentSummationDelivered>\
    <DeviceMacId>0x0123456789ABCDEF</DeviceMacId>\
    <MeterMacId>0xFEDCBA9876543210</MeterMacId>\
    <TimeStamp>0x29bd58a7</TimeStamp>\
    <SummationDelivered>0x00000010</SummationDelivered>\
    <SummationReceived>0x00000008</SummationReceived>\
    <Multiplier>0x00000004</Multiplier>\
    <Divisor>0x00000002</Divisor>\
    <DigitsRight>0x02</DigitsRight>\
    <DigitsLeft>0x04</DigitsLeft>\
    <SuppressLeadingZero>N</SuppressLeadingZero>\
    </CurrentSummationDelivered>";

pub const UNKNOWN_COMMAND: &[u8] = b"<Warning><Text>Unknown command</Text></Warning>";

/// One canned exchange: when `request` arrives, write `reply`
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: Vec<u8>,
    pub reply: Vec<u8>,
}

impl Exchange {
    pub fn new(request: &[u8], reply: &[u8]) -> Self {
        Self {
            request: request.to_vec(),
            reply: reply.to_vec(),
        }
    }
}

pub struct MockGateway {
    /// Device side of the link, usable to push unsolicited reports
    pushes: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<Vec<Vec<u8>>>,
}

impl MockGateway {
    /// Start a gateway that writes `initial` first, then answers `exchanges`
    pub fn start(exchanges: Vec<Exchange>, initial: Option<&[u8]>) -> (Self, DuplexStream) {
        let (client, device) = tokio::io::duplex(4096);
        let (pushes, receiver) = mpsc::unbounded_channel();
        let initial = initial.map(<[u8]>::to_vec);
        let task = tokio::spawn(device_loop(device, exchanges, initial, receiver));
        (Self { pushes, task }, client)
    }

    /// Write an unsolicited report
    pub fn push(&self, report: &[u8]) {
        let _ = self.pushes.send(report.to_vec());
    }

    /// Stop the gateway, closing its end of the link; returns the commands it
    /// recognized in order
    pub async fn stop(self) -> Vec<Vec<u8>> {
        drop(self.pushes);
        self.task.await.unwrap_or_default()
    }
}

async fn device_loop(
    mut device: DuplexStream,
    exchanges: Vec<Exchange>,
    initial: Option<Vec<u8>>,
    mut pushes: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Vec<Vec<u8>> {
    let mut received = Vec::new();
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 256];

    if let Some(initial) = initial {
        if device.write_all(&initial).await.is_err() {
            return received;
        }
    }

    loop {
        // pushes queued before a command arrives are written ahead of its reply
        tokio::select! {
            biased;
            push = pushes.recv() => match push {
                Some(report) => {
                    if device.write_all(&report).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            read = device.read(&mut chunk) => {
                let read = match read {
                    Ok(0) | Err(_) => break,
                    Ok(read) => read,
                };
                buffer.extend_from_slice(&chunk[..read]);

                loop {
                    let start = buffer
                        .iter()
                        .position(|byte| !byte.is_ascii_whitespace())
                        .unwrap_or(buffer.len());
                    buffer.drain(..start);

                    let Some(exchange) = exchanges
                        .iter()
                        .find(|exchange| buffer.starts_with(&exchange.request))
                    else {
                        break;
                    };
                    buffer.drain(..exchange.request.len());
                    received.push(exchange.request.clone());
                    if device.write_all(&exchange.reply).await.is_err() {
                        return received;
                    }
                }
            }
        }
    }
    received
}

/// Settings for tests that start on a clean boundary
pub fn unsynchronized() -> SessionConfig {
    raven_api::catalogue::session_config()
        .with_synchronize_on_open(false)
        .with_command_timeout(Duration::from_secs(2))
}

/// A device talking to a fresh mock gateway
pub async fn open_device(exchanges: Vec<Exchange>) -> (RavenDevice, MockGateway) {
    let (gateway, client) = MockGateway::start(exchanges, None);
    let device = RavenDevice::open_with_config(client, unsynchronized())
        .await
        .expect("device opens");
    (device, gateway)
}
