//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements     | Connects to                     |
//! |---------------|----------------|---------------------------------|
//! | `board`       | BoardPort      | LED / button GPIO               |
//! | `device_id`   | (none)         | eFuse MAC, claim code           |
//! | `hmac`        | SignerPort     | eFuse HMAC peripheral           |
//! | `http_client` | HttpClientPort | EspHttpConnection (TLS bundle)  |
//! | `log_sink`    | EventSink      | Serial log output               |
//! | `nvs`         | StoragePort    | NVS / in-memory store           |
//! | `time`        | ClockPort      | esp_timer, FreeRTOS, SNTP       |
//! | `wifi`        | WifiPort       | ESP-IDF WiFi STA + soft-AP      |

pub mod board;
pub mod device_id;
pub mod hmac;
pub mod http_client;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
