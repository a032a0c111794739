//! Connectivity state machine: auto-connect, link-loss fallback, reconnect
//! probing, and manual entry into the provisioning portal.

use embassy_time::Duration;

use crate::civil_time::{TimeSyncService, WallClock};
use crate::constants::{
    AUTO_CONNECT_TIMEOUT, CONFIG_HOLD_MS, INITIAL_SYNC_TIMEOUT, PORTAL_SSID,
    RECONNECT_PROBE_PERIOD_MS, RECONNECT_SYNC_TIMEOUT,
};

/// Which network mode the display is in. Owned exclusively by
/// [`ConnectivityMachine`]; read-only to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
    ConfigPortal,
}

/// Outcome of pumping the provisioning portal for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortalEvent {
    /// Portal is up, nothing happened yet.
    Pending,
    /// New credentials were submitted and persisted.
    CredentialsSaved,
    /// The portal cannot continue.
    Failed,
}

/// The Wi-Fi provisioning collaborator. Blocking windows are bounded by the
/// passed timeouts; the portal itself has none and is pumped per tick.
#[expect(async_fn_in_trait, reason = "single-threaded executor")]
pub trait Provisioner {
    /// Try to join with stored credentials. False when none are stored or
    /// the link did not come up within `timeout`.
    async fn try_auto_connect(&mut self, timeout: Duration) -> bool;
    /// Bring up the open access point and portal services.
    async fn start_config_portal(&mut self, ssid: &str) -> bool;
    /// Serve at most one portal interaction.
    async fn process_portal(&mut self) -> PortalEvent;
    fn is_link_up(&self) -> bool;
    fn reset_credentials(&mut self);
}

/// Debounced long-press detection for the provisioning button.
///
/// The press-start instant is latched on the falling edge, checked each
/// tick while the button stays down, and cleared on release. A continuous
/// hold fires at most once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonHoldTracker {
    press_start_ms: Option<u64>,
    fired: bool,
}

impl ButtonHoldTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample of the (active-low, already inverted) button level.
    /// Returns true on the tick the hold threshold is crossed.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> bool {
        if pressed {
            let start = *self.press_start_ms.get_or_insert(now_ms);
            if !self.fired && now_ms.saturating_sub(start) >= CONFIG_HOLD_MS {
                self.fired = true;
                return true;
            }
        } else {
            self.press_start_ms = None;
            self.fired = false;
        }
        false
    }
}

/// Governs transitions among the connectivity states.
#[derive(Debug)]
pub struct ConnectivityMachine {
    state: ConnectivityState,
    hold: ButtonHoldTracker,
    last_probe_ms: u64,
}

impl Default for ConnectivityMachine {
    fn default() -> Self {
        Self {
            state: ConnectivityState::Connecting,
            hold: ButtonHoldTracker::new(),
            last_probe_ms: 0,
        }
    }
}

impl ConnectivityMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Long-press handling. A hold of five seconds resets the stored
    /// credentials and opens the provisioning portal; ignored while the
    /// portal is already up.
    pub async fn poll_button(
        &mut self,
        pressed: bool,
        now_ms: u64,
        net: &mut impl Provisioner,
    ) {
        if self.state == ConnectivityState::ConfigPortal {
            return;
        }
        if self.hold.update(pressed, now_ms) {
            info!("Button held; resetting credentials and opening the portal");
            net.reset_credentials();
            if net.start_config_portal(PORTAL_SSID).await {
                self.state = ConnectivityState::ConfigPortal;
            } else {
                warn!("Configuration portal failed to start");
                self.state = ConnectivityState::Disconnected;
            }
        }
    }

    /// Re-evaluated at the top of every tick while nominally connected.
    pub fn check_link(&mut self, net: &impl Provisioner) {
        if self.state == ConnectivityState::Connected && !net.is_link_up() {
            warn!("WiFi link lost; switching to the fallback display");
            self.state = ConnectivityState::Disconnected;
        }
    }

    /// Resolve the transient `Connecting` state: one bounded auto-connect
    /// attempt, then one bounded sync whose failure is only logged.
    pub async fn establish(
        &mut self,
        now_ms: u64,
        net: &mut impl Provisioner,
        time_sync: &mut impl TimeSyncService,
        wall_clock: &mut WallClock,
    ) {
        info!("Connecting to WiFi");
        if net.try_auto_connect(AUTO_CONNECT_TIMEOUT).await {
            info!("WiFi connected; requesting network time");
            attempt_sync(INITIAL_SYNC_TIMEOUT, now_ms, time_sync, wall_clock).await;
            self.state = ConnectivityState::Connected;
        } else {
            warn!("WiFi connect failed; entering the fallback display");
            self.state = ConnectivityState::Disconnected;
        }
    }

    /// While disconnected, probe once per minute for a restored link. The
    /// transition back to `Connected` does not depend on the sync outcome.
    pub async fn probe_reconnect(
        &mut self,
        now_ms: u64,
        net: &mut impl Provisioner,
        time_sync: &mut impl TimeSyncService,
        wall_clock: &mut WallClock,
    ) {
        if now_ms.saturating_sub(self.last_probe_ms) < RECONNECT_PROBE_PERIOD_MS {
            return;
        }
        info!("Checking whether the WiFi link is back");
        if net.is_link_up() {
            info!("WiFi link restored; resuming the time display");
            attempt_sync(RECONNECT_SYNC_TIMEOUT, now_ms, time_sync, wall_clock).await;
            self.state = ConnectivityState::Connected;
        }
        self.last_probe_ms = now_ms;
    }

    /// Drive one step of the provisioning portal.
    pub async fn pump_portal(&mut self, net: &mut impl Provisioner) {
        match net.process_portal().await {
            PortalEvent::Pending => {}
            PortalEvent::CredentialsSaved => {
                info!("Credentials saved; leaving provisioning mode");
                self.state = ConnectivityState::Connected;
            }
            PortalEvent::Failed => {
                warn!("Portal failed; entering the fallback display");
                self.state = ConnectivityState::Disconnected;
            }
        }
    }
}

async fn attempt_sync(
    timeout: Duration,
    now_ms: u64,
    time_sync: &mut impl TimeSyncService,
    wall_clock: &mut WallClock,
) {
    match time_sync.sync(timeout).await {
        Ok(unix) => {
            info!("Time sync complete: unix seconds {}", unix.as_i64());
            wall_clock.mark_synced(unix, now_ms);
        }
        Err(err) => {
            warn!("Time sync failed: {}", err);
        }
    }
}
