#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Transport shared between the MQTT client and the session loop.
//!
//! `rust-mqtt` reads a packet in several awaits, so its receive future must
//! never be dropped halfway. The session loop instead waits on
//! [`wait_readable`], which takes no bytes off the socket and can be
//! abandoned at any point, and only then lets the client read a whole packet.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_io_async::{ErrorType, Read, Write};

pub type SocketCell<T> = Mutex<NoopRawMutex, T>;

/// Transports that can report pending input without consuming it.
pub trait WaitReadable {
    async fn wait_readable(&mut self);
}

#[cfg(target_os = "none")]
impl WaitReadable for embassy_net::tcp::TcpSocket<'_> {
    async fn wait_readable(&mut self) {
        self.wait_read_ready().await;
    }
}

/// Resolves once the transport has input. Dropping it loses nothing.
pub async fn wait_readable<T>(cell: &SocketCell<T>)
where
    T: WaitReadable,
{
    cell.lock().await.wait_readable().await;
}

/// Handle given to the MQTT client; every call locks the shared transport.
pub struct SharedSocket<'a, T> {
    cell: &'a SocketCell<T>,
}

impl<'a, T> SharedSocket<'a, T> {
    pub const fn new(cell: &'a SocketCell<T>) -> Self {
        Self { cell }
    }
}

impl<T> ErrorType for SharedSocket<'_, T>
where
    T: ErrorType,
{
    type Error = T::Error;
}

impl<T> Read for SharedSocket<'_, T>
where
    T: Read,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.cell.lock().await.read(buf).await
    }
}

impl<T> Write for SharedSocket<'_, T>
where
    T: Write,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.cell.lock().await.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.cell.lock().await.flush().await
    }
}
