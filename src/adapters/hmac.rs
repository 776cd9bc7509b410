//! Webhook payload signer.
//!
//! Implements [`SignerPort`] with HMAC-SHA256.
//!
//! | Backend   | Key location                         | Target       |
//! |-----------|--------------------------------------|--------------|
//! | `efuse()` | eFuse key block 4, never readable    | ESP-IDF only |
//! | `software`| 32-byte key held in RAM              | any          |
//! | `unkeyed` | none, every call fails               | any          |
//!
//! The eFuse key is burned at the factory.  Whether it exists is only
//! known by trying, so the firmware tries it once at boot.

use crate::app::ports::{SignError, SignerPort};

enum Backend {
    #[cfg(target_os = "espidf")]
    Efuse,
    Software([u8; 32]),
    Unkeyed,
}

pub struct HmacSigner {
    backend: Backend,
}

impl HmacSigner {
    /// Hardware HMAC peripheral with the eFuse key.
    #[cfg(target_os = "espidf")]
    pub fn efuse() -> Self {
        Self {
            backend: Backend::Efuse,
        }
    }

    pub fn software(key: [u8; 32]) -> Self {
        Self {
            backend: Backend::Software(key),
        }
    }

    pub fn unkeyed() -> Self {
        Self {
            backend: Backend::Unkeyed,
        }
    }

    #[cfg(target_os = "espidf")]
    fn sign_efuse(message: &[u8]) -> Result<[u8; 32], SignError> {
        use esp_idf_svc::sys::{ESP_FAIL, ESP_OK, esp_hmac_calculate, hmac_key_id_t_HMAC_KEY4};

        let mut out = [0u8; 32];
        // SAFETY: `message` and `out` outlive the call; `out` is the 32
        // bytes the peripheral writes.
        let ret = unsafe {
            esp_hmac_calculate(
                hmac_key_id_t_HMAC_KEY4,
                message.as_ptr().cast(),
                message.len(),
                out.as_mut_ptr(),
            )
        };
        match ret {
            ESP_OK => Ok(out),
            ESP_FAIL => Err(SignError::KeyUnavailable),
            code => Err(SignError::Hardware(code)),
        }
    }
}

impl SignerPort for HmacSigner {
    fn sign(&mut self, message: &[u8]) -> Result<[u8; 32], SignError> {
        match &self.backend {
            #[cfg(target_os = "espidf")]
            Backend::Efuse => Self::sign_efuse(message),
            Backend::Software(key) => Ok(hmac_sha256::HMAC::mac(message, key)),
            Backend::Unkeyed => Err(SignError::KeyUnavailable),
        }
    }
}
