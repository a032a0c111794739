//! CYW43 Wi-Fi bring-up and the provisioning service.
//!
//! Client mode joins with the stored credentials under a bounded timeout.
//! The configuration portal runs an open access point at 192.168.4.1 with
//! a catch-all DNS responder and a one-page HTTP form; the portal is
//! pumped one interaction at a time from the tick loop.

use cyw43::JoinOptions;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{
    Config, ConfigV4, DhcpConfig, Ipv4Address, Ipv4Cidr, Stack, StackResources, StaticConfigV4,
};
use embassy_rp::Peri;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::Write;
use static_cell::StaticCell;

use crate::connectivity::{PortalEvent, Provisioner};
use crate::constants::AUTO_CONNECT_TIMEOUT;
use crate::credentials::{CredentialStore, WifiCredentials};
use crate::error::Result;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

const PORTAL_IP: Ipv4Address = Ipv4Address::new(192, 168, 4, 1);
const PORTAL_HTTP_PORT: u16 = 80;
const DNS_PORT: u16 = 53;
/// How long one portal pump waits for a browser before yielding.
const PORTAL_ACCEPT_WINDOW: Duration = Duration::from_millis(250);

pub struct PicoWifi {
    control: cyw43::Control<'static>,
    stack: Stack<'static>,
    store: CredentialStore,
    spawner: Spawner,
    dns_started: bool,
}

impl PicoWifi {
    /// Bring up the radio and the network stack in client (DHCP) mode and
    /// spawn their background runners.
    #[expect(
        clippy::too_many_arguments,
        reason = "One parameter per CYW43 wiring pin"
    )]
    pub async fn new(
        spawner: Spawner,
        pwr_pin: Peri<'static, PIN_23>,
        cs_pin: Peri<'static, PIN_25>,
        pio: Peri<'static, PIO0>,
        clk_pin: Peri<'static, PIN_24>,
        dio_pin: Peri<'static, PIN_29>,
        dma: Peri<'static, DMA_CH0>,
        store: CredentialStore,
    ) -> Result<Self> {
        let firmware = cyw43_firmware::CYW43_43439A0;
        let clm = cyw43_firmware::CYW43_43439A0_CLM;

        let pwr = Output::new(pwr_pin, Level::Low);
        let cs = Output::new(cs_pin, Level::High);
        let mut pio = Pio::new(pio, Irqs);
        let spi = PioSpi::new(
            &mut pio.common,
            pio.sm0,
            DEFAULT_CLOCK_DIVIDER,
            pio.irq0,
            cs,
            clk_pin,
            dio_pin,
            dma,
        );

        static STATE: StaticCell<cyw43::State> = StaticCell::new();
        let state = STATE.init(cyw43::State::new());
        let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, firmware).await;
        let radio_token = cyw43_runner_task(runner)?;
        spawner.spawn(radio_token);

        control.init(clm).await;
        control
            .set_power_management(cyw43::PowerManagementMode::PowerSave)
            .await;

        static RESOURCES: StaticCell<StackResources<8>> = StaticCell::new();
        let seed = 0x7c8f_3a2e_9d14_6b5a;
        let (stack, net_runner) = embassy_net::new(
            net_device,
            Config::dhcpv4(DhcpConfig::default()),
            RESOURCES.init(StackResources::new()),
            seed,
        );
        let net_token = net_runner_task(net_runner)?;
        spawner.spawn(net_token);

        Ok(Self {
            control,
            stack,
            store,
            spawner,
            dns_started: false,
        })
    }

    /// The network stack handle, for the NTP client.
    #[must_use]
    pub const fn stack(&self) -> Stack<'static> {
        self.stack
    }

    async fn join_with(&mut self, credentials: &WifiCredentials, timeout: Duration) -> bool {
        info!("Joining WiFi network {}", credentials.ssid.as_str());
        with_timeout(timeout, async {
            loop {
                match self
                    .control
                    .join(
                        credentials.ssid.as_str(),
                        JoinOptions::new(credentials.password.as_bytes()),
                    )
                    .await
                {
                    Ok(()) => break,
                    Err(err) => {
                        warn!("Join failed with status {}", err.status);
                        Timer::after_secs(1).await;
                    }
                }
            }
            self.stack.wait_config_up().await;
        })
        .await
        .is_ok()
    }
}

impl Provisioner for PicoWifi {
    async fn try_auto_connect(&mut self, timeout: Duration) -> bool {
        let credentials = match self.store.load() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                info!("No stored WiFi credentials");
                return false;
            }
            Err(err) => {
                warn!("Credential load failed: {}", err);
                return false;
            }
        };
        self.join_with(&credentials, timeout).await
    }

    async fn start_config_portal(&mut self, ssid: &str) -> bool {
        info!("Starting the configuration portal ({})", ssid);
        self.control.leave().await;
        self.stack.set_config_v4(ConfigV4::Static(StaticConfigV4 {
            address: Ipv4Cidr::new(PORTAL_IP, 24),
            gateway: Some(PORTAL_IP),
            dns_servers: heapless::Vec::from_slice(&[PORTAL_IP]).unwrap_or_default(),
        }));
        self.control.start_ap_open(ssid, 1).await;
        if !self.dns_started {
            let Ok(dns_token) = dns_catchall_task(self.stack, PORTAL_IP) else {
                warn!("Could not start the portal DNS responder");
                return false;
            };
            self.spawner.spawn(dns_token);
            self.dns_started = true;
        }
        info!("Portal up at {}", PORTAL_IP);
        true
    }

    async fn process_portal(&mut self) -> PortalEvent {
        let mut rx_buffer = [0_u8; 2048];
        let mut tx_buffer = [0_u8; 2048];
        let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(5)));

        match with_timeout(PORTAL_ACCEPT_WINDOW, socket.accept(PORTAL_HTTP_PORT)).await {
            Err(_) => return PortalEvent::Pending,
            Ok(Err(_)) => return PortalEvent::Pending,
            Ok(Ok(())) => {}
        }

        let mut request = [0_u8; 1024];
        let request_len = match socket.read(&mut request).await {
            Ok(0) | Err(_) => {
                socket.close();
                return PortalEvent::Pending;
            }
            Ok(len) => len,
        };
        #[expect(clippy::indexing_slicing, reason = "read returned at most the buffer length")]
        let request_text = core::str::from_utf8(&request[..request_len]).unwrap_or("");

        let request_line = request_text.lines().next().unwrap_or("");
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("");
        let path = parts.next().unwrap_or("/");

        let mut saved = false;
        let response = match (method, path) {
            ("GET", "/") => FORM_PAGE,
            ("POST", "/") => match parse_credentials(request_text) {
                Some(credentials) => match self.store.save(&credentials) {
                    Ok(()) => {
                        saved = true;
                        SAVED_PAGE
                    }
                    Err(err) => {
                        error!("Could not persist credentials: {}", err);
                        ERROR_PAGE
                    }
                },
                None => {
                    warn!("Portal submission was missing an SSID");
                    ERROR_PAGE
                }
            },
            _ => REDIRECT_RESPONSE,
        };

        if socket.write_all(response.as_bytes()).await.is_err() {
            warn!("Portal response write failed");
        }
        let _ = socket.flush().await;
        socket.close();

        if !saved {
            return PortalEvent::Pending;
        }

        // Leave access-point mode and try the new credentials right away.
        // If the join does not complete, the per-tick link check drops the
        // display into fallback mode.
        let credentials = match self.store.load() {
            Ok(Some(credentials)) => credentials,
            _ => return PortalEvent::Failed,
        };
        self.control.leave().await;
        self.stack.set_config_v4(ConfigV4::Dhcp(DhcpConfig::default()));
        self.join_with(&credentials, AUTO_CONNECT_TIMEOUT).await;
        PortalEvent::CredentialsSaved
    }

    fn is_link_up(&self) -> bool {
        self.stack.is_link_up()
    }

    fn reset_credentials(&mut self) {
        if let Err(err) = self.store.clear() {
            warn!("Credential reset failed: {}", err);
        }
    }
}

#[embassy_executor::task]
async fn cyw43_runner_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_runner_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Answers every DNS query with the portal address so captive-portal
/// detection lands on the form.
#[embassy_executor::task]
#[expect(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "Offsets are bounded by the checked query length"
)]
async fn dns_catchall_task(stack: Stack<'static>, answer_ip: Ipv4Address) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0_u8; 512];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0_u8; 512];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    if socket.bind(DNS_PORT).is_err() {
        core::panic!("Unable to bind the DNS port");
    }
    info!("Portal DNS responder answering with {}", answer_ip);

    let mut query = [0_u8; 512];
    loop {
        let Ok((query_len, remote)) = socket.recv_from(&mut query).await else {
            continue;
        };
        // A DNS header is 12 bytes; we also need room for one A record.
        if query_len < 12 || query_len + 16 > query.len() {
            continue;
        }

        let mut response = [0_u8; 512];
        response[..query_len].copy_from_slice(&query[..query_len]);
        // QR=1, AA=1, no error.
        response[2] = 0x84;
        response[3] = 0x00;
        // One answer record.
        response[6] = 0x00;
        response[7] = 0x01;

        let mut position = query_len;
        // Name: pointer back to the question. Type A, class IN.
        for byte in [0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01] {
            response[position] = byte;
            position += 1;
        }
        // TTL 60 seconds, RDLENGTH 4, then the address.
        for byte in [0x00, 0x00, 0x00, 0x3C, 0x00, 0x04] {
            response[position] = byte;
            position += 1;
        }
        response[position..position + 4].copy_from_slice(&answer_ip.octets());
        position += 4;

        if socket.send_to(&response[..position], remote).await.is_err() {
            warn!("DNS answer send failed");
        }
    }
}

fn parse_credentials(request: &str) -> Option<WifiCredentials> {
    let body_start = request.find("\r\n\r\n")?;
    #[expect(clippy::arithmetic_side_effects, reason = "find returned an in-bounds offset")]
    #[expect(clippy::indexing_slicing, reason = "find returned an in-bounds offset")]
    let body = &request[body_start + 4..];

    let mut ssid = heapless::String::<32>::new();
    let mut password = heapless::String::<64>::new();
    for parameter in body.split('&') {
        if let Some((key, value)) = parameter.split_once('=') {
            let decoded = url_decode(value);
            match key {
                "ssid" => {
                    let _ = ssid.push_str(&decoded);
                }
                "password" => {
                    let _ = password.push_str(&decoded);
                }
                _ => {}
            }
        }
    }
    if ssid.is_empty() {
        return None;
    }
    Some(WifiCredentials { ssid, password })
}

fn url_decode(encoded: &str) -> heapless::String<64> {
    let mut decoded = heapless::String::<64>::new();
    let mut characters = encoded.chars();
    while let Some(character) = characters.next() {
        match character {
            '+' => {
                let _ = decoded.push(' ');
            }
            '%' => {
                let high = characters.next().and_then(|c| c.to_digit(16));
                let low = characters.next().and_then(|c| c.to_digit(16));
                if let (Some(high), Some(low)) = (high, low) {
                    #[expect(
                        clippy::cast_possible_truncation,
                        reason = "Two hex digits always fit a byte"
                    )]
                    let byte = ((high << 4) | low) as u8;
                    let _ = decoded.push(byte as char);
                }
            }
            other => {
                let _ = decoded.push(other);
            }
        }
    }
    decoded
}

const FORM_PAGE: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<!DOCTYPE html>\
<html>\
<head>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>Clock WiFi Setup</title>\
</head>\
<body>\
<h1>Clock WiFi Setup</h1>\
<p>Enter your network credentials:</p>\
<form method=\"POST\" action=\"/\">\
<label for=\"ssid\">Network name (SSID)</label><br>\
<input type=\"text\" id=\"ssid\" name=\"ssid\" required><br>\
<label for=\"password\">Password</label><br>\
<input type=\"password\" id=\"password\" name=\"password\"><br><br>\
<button type=\"submit\">Save</button>\
</form>\
</body>\
</html>";

const SAVED_PAGE: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<!DOCTYPE html>\
<html>\
<body>\
<h1>Saved</h1>\
<p>The clock will now connect to your network.</p>\
</body>\
</html>";

const ERROR_PAGE: &str = "HTTP/1.1 400 Bad Request\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<!DOCTYPE html>\
<html>\
<body>\
<h1>Something went wrong</h1>\
<p><a href=\"/\">Try again</a></p>\
</body>\
</html>";

const REDIRECT_RESPONSE: &str =
    "HTTP/1.1 302 Found\r\nLocation: /\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
