//! SNTP client for the time-sync collaborator.
//!
//! One `sync` call retries inside the caller's bounded window: DNS resolve,
//! a 48-byte version-3 client request, and the transmit timestamp from the
//! response. Answers whose derived calendar year is implausible are
//! rejected and retried.

use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, with_timeout};
use time::OffsetDateTime;

use crate::civil_time::{SyncError, TimeSyncService, UnixSeconds};
use crate::error::Result;

const NTP_SERVER: &str = "ch.pool.ntp.org";
const NTP_PORT: u16 = 123;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_PAUSE: Duration = Duration::from_millis(100);

pub struct NtpClient {
    stack: Stack<'static>,
}

impl NtpClient {
    #[must_use]
    pub const fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl TimeSyncService for NtpClient {
    async fn sync(&mut self, timeout: Duration) -> Result<UnixSeconds, SyncError> {
        let mut saw_invalid_date = false;
        let outcome = with_timeout(timeout, async {
            loop {
                match fetch_once(self.stack).await {
                    Ok(unix) if year_is_plausible(unix) => return unix,
                    Ok(unix) => {
                        saw_invalid_date = true;
                        warn!("NTP answer has an implausible date: {}", unix.as_i64());
                    }
                    Err(message) => {
                        warn!("NTP fetch failed: {}", message);
                    }
                }
                Timer::after(RETRY_PAUSE).await;
            }
        })
        .await;
        match outcome {
            Ok(unix) => Ok(unix),
            Err(_) if saw_invalid_date => Err(SyncError::InvalidDate),
            Err(_) => Err(SyncError::Timeout),
        }
    }
}

fn year_is_plausible(unix: UnixSeconds) -> bool {
    OffsetDateTime::from_unix_timestamp(unix.as_i64())
        .map(|datetime| datetime.year() > 2016)
        .unwrap_or(false)
}

#[expect(clippy::indexing_slicing, reason = "The response is checked to be 48 bytes")]
async fn fetch_once(stack: Stack<'static>) -> Result<UnixSeconds, &'static str> {
    let addresses = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|_| "DNS lookup failed")?;
    let server = *addresses.first().ok_or("No DNS results")?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0_u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0_u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| "Socket bind failed")?;

    // LI=0, VN=3, Mode=3 (client).
    let mut request = [0_u8; 48];
    request[0] = 0x1B;
    socket
        .send_to(&request, (server, NTP_PORT))
        .await
        .map_err(|_| "NTP send failed")?;

    let mut response = [0_u8; 48];
    let (len, _remote) = with_timeout(RESPONSE_TIMEOUT, socket.recv_from(&mut response))
        .await
        .map_err(|_| "NTP receive timeout")?
        .map_err(|_| "NTP receive failed")?;
    if len < 48 {
        return Err("NTP response too short");
    }

    // Transmit timestamp, seconds field (bytes 40-43, big-endian).
    let ntp_seconds = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    UnixSeconds::from_ntp_seconds(ntp_seconds).ok_or("NTP timestamp predates the Unix epoch")
}
