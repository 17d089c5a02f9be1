//! System-wide constants for the HeliFX workspace.
//!
//! Single source of truth for pulse bands, capacities and default timings.
//! Imported by all crates; values are defined here only.

/// Shortest pulse accepted from a receiver channel [µs].
pub const PULSE_MIN_US: i32 = 500;

/// Longest pulse accepted from a receiver channel [µs].
pub const PULSE_MAX_US: i32 = 3000;

/// Maximum number of capture monitors served by the shared polling thread.
pub const MAX_PWM_MONITORS: usize = 8;

/// Slots in each monitor's averaging ring buffer.
pub const CAPTURE_WINDOW_CAPACITY: usize = 128;

/// Default averaging window [ms].
pub const DEFAULT_AVG_WINDOW_MS: u32 = 200;

/// Averaging window bounds [ms].
pub const MIN_AVG_WINDOW_MS: u32 = 10;
/// Upper averaging window bound [ms].
pub const MAX_AVG_WINDOW_MS: u32 = 5000;

/// Poll timeout of the shared edge thread [ms].
pub const EDGE_POLL_TIMEOUT_MS: u16 = 1000;

/// Highest usable BCM GPIO line on the 40-pin header.
pub const MAX_GPIO_PIN: u32 = 27;

/// Lines owned by the WM8960 audio HAT (I2C SDA/SCL, I2S BCK/LRCK/DIN/DOUT).
pub const RESERVED_PINS: [u32; 6] = [2, 3, 18, 19, 20, 21];

/// Default servo control loop rate [Hz].
pub const DEFAULT_SERVO_RATE_HZ: u32 = 50;

/// Default smoke fan run-on after firing stops [ms].
pub const DEFAULT_FAN_OFF_DELAY_MS: u32 = 2000;

/// Default heater toggle threshold [µs].
pub const DEFAULT_HEATER_THRESHOLD_US: i32 = 1500;

/// Interval between gun status snapshots [ms].
pub const STATUS_INTERVAL_MS: u64 = 10_000;

/// Default GPIO character device.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/helifx/helifx.toml";

/// Returns `true` if `pin` is held by the audio HAT.
pub const fn is_reserved_pin(pin: u32) -> bool {
    let mut i = 0;
    while i < RESERVED_PINS.len() {
        if RESERVED_PINS[i] == pin {
            return true;
        }
        i += 1;
    }
    false
}
