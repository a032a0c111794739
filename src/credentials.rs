//! Wi-Fi credentials persisted in the last internal-flash sector.
//!
//! Layout: magic (4 bytes), payload length (2 bytes), postcard payload,
//! CRC32 over everything before it. A bad CRC or undecodable payload is
//! reported as corruption; a missing magic is simply "nothing stored".

use embassy_rp::Peri;
use embassy_rp::flash::{Blocking, ERASE_SIZE, Flash};
use embassy_rp::peripherals::FLASH;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Internal flash size of the Pico W (2 MB).
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

const MAGIC: u32 = 0x434C_4B43; // "CLKC"
const HEADER_SIZE: usize = 4 + 2;
const CRC_SIZE: usize = 4;
const MAX_PAYLOAD_SIZE: usize = ERASE_SIZE - HEADER_SIZE - CRC_SIZE;

/// Network name and passphrase collected by the provisioning portal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

/// Owns the flash peripheral and the sector the credentials live in.
pub struct CredentialStore {
    flash: Flash<'static, FLASH, Blocking, FLASH_SIZE>,
}

#[expect(
    clippy::indexing_slicing,
    reason = "All offsets are within the fixed-size sector buffer"
)]
#[expect(
    clippy::arithmetic_side_effects,
    reason = "Offsets are small compile-time constants plus a checked length"
)]
impl CredentialStore {
    #[must_use]
    pub fn new(flash: Peri<'static, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }

    fn sector_offset(&self) -> u32 {
        #[expect(clippy::cast_possible_truncation, reason = "Flash capacity fits u32")]
        let capacity = self.flash.capacity() as u32;
        capacity - ERASE_SIZE as u32
    }

    /// Load stored credentials, if any.
    ///
    /// # Errors
    ///
    /// [`Error::CredentialStorageCorrupted`] when the sector carries the
    /// magic but fails validation.
    pub fn load(&mut self) -> Result<Option<WifiCredentials>> {
        let offset = self.sector_offset();
        let mut buffer = [0_u8; ERASE_SIZE];
        self.flash.blocking_read(offset, &mut buffer)?;

        let magic = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        if magic != MAGIC {
            return Ok(None);
        }

        let payload_len = usize::from(u16::from_le_bytes([buffer[4], buffer[5]]));
        if payload_len > MAX_PAYLOAD_SIZE {
            error!("Credential sector has an invalid payload length");
            return Err(Error::CredentialStorageCorrupted);
        }

        let crc_offset = HEADER_SIZE + payload_len;
        let stored_crc = u32::from_le_bytes([
            buffer[crc_offset],
            buffer[crc_offset + 1],
            buffer[crc_offset + 2],
            buffer[crc_offset + 3],
        ]);
        if stored_crc != crc32(&buffer[..crc_offset]) {
            error!("Credential sector failed its CRC check");
            return Err(Error::CredentialStorageCorrupted);
        }

        let payload = &buffer[HEADER_SIZE..crc_offset];
        let credentials =
            postcard::from_bytes(payload).map_err(|_| Error::CredentialStorageCorrupted)?;
        Ok(Some(credentials))
    }

    /// Persist credentials, replacing whatever was stored.
    pub fn save(&mut self, credentials: &WifiCredentials) -> Result<()> {
        let mut payload = [0_u8; MAX_PAYLOAD_SIZE];
        let payload_len = postcard::to_slice(credentials, &mut payload)
            .map_err(|_| Error::CredentialsTooLarge)?
            .len();

        let mut buffer = [0xFF_u8; ERASE_SIZE];
        buffer[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        #[expect(clippy::cast_possible_truncation, reason = "Payload length fits u16")]
        buffer[4..6].copy_from_slice(&(payload_len as u16).to_le_bytes());
        buffer[HEADER_SIZE..HEADER_SIZE + payload_len].copy_from_slice(&payload[..payload_len]);
        let crc_offset = HEADER_SIZE + payload_len;
        buffer[crc_offset..crc_offset + CRC_SIZE]
            .copy_from_slice(&crc32(&buffer[..crc_offset]).to_le_bytes());

        let offset = self.sector_offset();
        self.flash
            .blocking_erase(offset, offset + ERASE_SIZE as u32)?;
        self.flash.blocking_write(offset, &buffer)?;
        info!("Stored WiFi credentials ({} payload bytes)", payload_len);
        Ok(())
    }

    /// Erase the credential sector. Afterwards [`load`](Self::load)
    /// returns `Ok(None)`.
    pub fn clear(&mut self) -> Result<()> {
        let offset = self.sector_offset();
        self.flash
            .blocking_erase(offset, offset + ERASE_SIZE as u32)?;
        info!("Cleared stored WiFi credentials");
        Ok(())
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
