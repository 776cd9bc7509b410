//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for the two namespaces the firmware uses:
//!
//! | Namespace | Keys                             | Owner                       |
//! |-----------|----------------------------------|-----------------------------|
//! | `streak`  | `data` (u8), `lastDay` (i32)     | [`StreakStore`](crate::app::streak::StreakStore) |
//! | `wifi`    | `ssid` (str), `password` (str)   | [`WifiCredentials`](crate::provisioning::WifiCredentials) |
//!
//! - Typed entries: `nvs_set_u8` / `nvs_set_i32` / `nvs_set_str`, so flash
//!   written by earlier firmware reads back unchanged.
//! - Atomic writes: all entries of one `write_entries` call share a single
//!   `nvs_commit()`.
//! - Factory reset erases whole namespaces with `nvs_erase_all`.
//! - The host build keeps an in-memory map with the same semantics,
//!   including "wrong type reads as not found".

use crate::app::ports::{StorageError, StoragePort, StoredValue};
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

/// NVS key and namespace names are limited to 15 characters.
#[cfg(target_os = "espidf")]
const NVS_NAME_MAX: usize = 15;

/// Owned copy of a [`StoredValue`] for the simulation map.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
enum SimEntry {
    U8(u8),
    I32(i32),
    Str(String),
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, SimEntry>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret = unsafe { nvs_flash_erase() };
                if ret != ESP_OK {
                    return Err(StorageError::Io(ret));
                }
                let ret = unsafe { nvs_flash_init() };
                if ret != ESP_OK {
                    return Err(StorageError::Io(ret));
                }
            } else if ret != ESP_OK {
                return Err(StorageError::Io(ret));
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of a namespace or key name.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_MAX + 1] {
        let mut buf = [0u8; NVS_NAME_MAX + 1];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NVS_NAME_MAX);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    #[cfg(target_os = "espidf")]
    fn map_err(code: i32) -> StorageError {
        match code {
            ESP_ERR_NVS_NOT_FOUND => StorageError::NotFound,
            ESP_ERR_NVS_NOT_ENOUGH_SPACE => StorageError::Full,
            other => StorageError::Io(other),
        }
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    fn sim_get(&self, namespace: &str, key: &str) -> Option<SimEntry> {
        self.store
            .borrow()
            .get(&Self::composite_key(namespace, key))
            .cloned()
    }
}

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    /// Read-only open, one getter call, close.
    fn get_with<T>(
        namespace: &str,
        key: &str,
        f: impl FnOnce(nvs_handle_t, *const core::ffi::c_char) -> Result<T, i32>,
    ) -> Result<T, StorageError> {
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, false, |handle| f(handle, key.as_ptr().cast()))
            .map_err(Self::map_err)
    }

    fn set_one(handle: nvs_handle_t, key: &str, value: StoredValue<'_>) -> Result<(), i32> {
        let key = Self::c_name(key);
        let key = key.as_ptr().cast();
        let ret = match value {
            StoredValue::U8(v) => unsafe { nvs_set_u8(handle, key, v) },
            StoredValue::I32(v) => unsafe { nvs_set_i32(handle, key, v) },
            StoredValue::Str(v) => {
                let Ok(v) = std::ffi::CString::new(v) else {
                    return Err(ESP_ERR_INVALID_ARG as esp_err_t);
                };
                unsafe { nvs_set_str(handle, key, v.as_ptr()) }
            }
        };
        if ret != ESP_OK {
            return Err(ret);
        }
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    fn read_u8(&self, namespace: &str, key: &str) -> Result<u8, StorageError> {
        match self.sim_get(namespace, key) {
            Some(SimEntry::U8(v)) => Ok(v),
            _ => Err(StorageError::NotFound),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_u8(&self, namespace: &str, key: &str) -> Result<u8, StorageError> {
        Self::get_with(namespace, key, |handle, key| {
            let mut out = 0u8;
            let ret = unsafe { nvs_get_u8(handle, key, &mut out) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(out)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_i32(&self, namespace: &str, key: &str) -> Result<i32, StorageError> {
        match self.sim_get(namespace, key) {
            Some(SimEntry::I32(v)) => Ok(v),
            _ => Err(StorageError::NotFound),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_i32(&self, namespace: &str, key: &str) -> Result<i32, StorageError> {
        Self::get_with(namespace, key, |handle, key| {
            let mut out = 0i32;
            let ret = unsafe { nvs_get_i32(handle, key, &mut out) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(out)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_str(&self, namespace: &str, key: &str) -> Result<String, StorageError> {
        match self.sim_get(namespace, key) {
            Some(SimEntry::Str(v)) => Ok(v),
            _ => Err(StorageError::NotFound),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_str(&self, namespace: &str, key: &str) -> Result<String, StorageError> {
        let bytes = Self::get_with(namespace, key, |handle, key| {
            // First call reports the length including the terminator.
            let mut len = 0usize;
            let ret = unsafe { nvs_get_str(handle, key, core::ptr::null_mut(), &mut len) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let mut buf = vec![0u8; len];
            let ret = unsafe { nvs_get_str(handle, key, buf.as_mut_ptr().cast(), &mut len) };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(len.saturating_sub(1));
            Ok(buf)
        })?;
        String::from_utf8(bytes).map_err(|_| StorageError::Io(ESP_ERR_INVALID_ARG as esp_err_t))
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_entries(
        &mut self,
        namespace: &str,
        entries: &[(&str, StoredValue<'_>)],
    ) -> Result<(), StorageError> {
        let mut store = self.store.borrow_mut();
        for (key, value) in entries {
            let entry = match *value {
                StoredValue::U8(v) => SimEntry::U8(v),
                StoredValue::I32(v) => SimEntry::I32(v),
                StoredValue::Str(v) => SimEntry::Str(v.to_owned()),
            };
            store.insert(Self::composite_key(namespace, key), entry);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn write_entries(
        &mut self,
        namespace: &str,
        entries: &[(&str, StoredValue<'_>)],
    ) -> Result<(), StorageError> {
        Self::with_nvs_handle(namespace, true, |handle| {
            for (key, value) in entries {
                Self::set_one(handle, key, *value)?;
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: write to '{}' failed ({})", namespace, e);
            Self::map_err(e)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let prefix = format!("{}::", namespace);
        self.store
            .borrow_mut()
            .retain(|k: &String, _: &mut SimEntry| !k.starts_with(&prefix));
        info!("NvsAdapter: erased '{}' (simulation)", namespace);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let result = Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe { nvs_erase_all(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        match result {
            Ok(()) => {
                info!("NvsAdapter: erased '{}'", namespace);
                Ok(())
            }
            // Never written: nothing to erase.
            Err(ESP_ERR_NVS_NOT_FOUND) => Ok(()),
            Err(e) => Err(Self::map_err(e)),
        }
    }
}
