//! On-board output driver.
//!
//! Smoke fan, smoke heater and nozzle flash are plain GPIO outputs. Servo
//! pulses come from the hardware PWM channels at a 20 ms frame.

use helifx_common::fx::config::HeliFxConfig;
use helifx_common::fx::driver::{OutputDriver, OutputError};
use helifx_common::fx::types::{PinId, ServoAxisId};
use rppal::gpio::{Gpio, OutputPin};
use rppal::pwm::{Channel, Polarity, Pwm};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Servo frame period (50 Hz).
const SERVO_PERIOD: Duration = Duration::from_millis(20);

/// Pulse held until the gun writes the first servo value.
const SERVO_NEUTRAL: Duration = Duration::from_micros(1500);

/// One switched output.
#[derive(Debug)]
struct Switch {
    line: OutputPin,
}

impl Switch {
    fn set(&mut self, on: bool) {
        if on {
            self.line.set_high();
        } else {
            self.line.set_low();
        }
    }
}

/// One servo output channel.
#[derive(Debug)]
struct ServoOutput {
    channel: u32,
    pwm: Pwm,
}

/// GPIO + hardware PWM output driver.
#[derive(Debug, Default)]
pub struct GpioOutput {
    fan: Option<Switch>,
    heater: Option<Switch>,
    flash: Option<Switch>,
    pitch: Option<ServoOutput>,
    yaw: Option<ServoOutput>,
}

impl GpioOutput {
    /// Driver with nothing claimed.
    pub fn new() -> Self {
        Self::default()
    }
}

/// PWM channel for a configured channel number.
fn pwm_channel(channel: u32) -> Result<Channel, OutputError> {
    match channel {
        0 => Ok(Channel::Pwm0),
        1 => Ok(Channel::Pwm1),
        2 => Ok(Channel::Pwm2),
        3 => Ok(Channel::Pwm3),
        other => Err(OutputError::InitFailed(format!(
            "PWM channel {other} does not exist (0-3)"
        ))),
    }
}

/// High time for `pulse_us`, limited to one frame.
fn pulse_width(pulse_us: i32) -> Duration {
    Duration::from_micros(u64::from(pulse_us.max(0).unsigned_abs())).min(SERVO_PERIOD)
}

fn claim_switch(gpio: &Gpio, pin: Option<PinId>, label: &str) -> Result<Option<Switch>, OutputError> {
    let Some(pin) = pin else {
        return Ok(None);
    };
    let bcm = u8::try_from(pin)
        .map_err(|_| OutputError::InitFailed(format!("{label}: GPIO {pin} out of range")))?;
    let line = gpio
        .get(bcm)
        .map_err(|e| OutputError::InitFailed(format!("{label} on GPIO {pin}: {e}")))?
        .into_output_low();
    debug!("{} on GPIO {}", label, pin);
    Ok(Some(Switch { line }))
}

fn claim_servo(channel: Option<u32>, label: &str) -> Result<Option<ServoOutput>, OutputError> {
    let Some(channel) = channel else {
        return Ok(None);
    };
    let pwm = Pwm::with_period(
        pwm_channel(channel)?,
        SERVO_PERIOD,
        SERVO_NEUTRAL,
        Polarity::Normal,
        true,
    )
    .map_err(|e| OutputError::InitFailed(format!("{label} on PWM {channel}: {e}")))?;
    Ok(Some(ServoOutput { channel, pwm }))
}

fn set_switch(switch: Option<&mut Switch>, on: bool) {
    if let Some(switch) = switch {
        switch.set(on);
    }
}

impl OutputDriver for GpioOutput {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn init(&mut self, config: &HeliFxConfig) -> Result<(), OutputError> {
        let gun = &config.gun;
        let smoke = gun.smoke.enabled && (gun.smoke.fan_pin.is_some() || gun.smoke.heater_pin.is_some());
        let flash = gun.nozzle_flash.enabled && gun.nozzle_flash.pin.is_some();

        if smoke || flash {
            let gpio = Gpio::new().map_err(|e| OutputError::InitFailed(format!("GPIO: {e}")))?;
            if smoke {
                self.fan = claim_switch(&gpio, gun.smoke.fan_pin, "smoke fan")?;
                self.heater = claim_switch(&gpio, gun.smoke.heater_pin, "smoke heater")?;
            }
            if flash {
                self.flash = claim_switch(&gpio, gun.nozzle_flash.pin, "nozzle flash")?;
            }
        }

        if gun.pitch_servo.enabled {
            self.pitch = claim_servo(gun.pitch_servo.pwm_channel, "pitch servo")?;
        }
        if gun.yaw_servo.enabled {
            self.yaw = claim_servo(gun.yaw_servo.pwm_channel, "yaw servo")?;
        }

        info!(
            "GPIO outputs ready: fan={} heater={} flash={} pitch={} yaw={}",
            self.fan.is_some(),
            self.heater.is_some(),
            self.flash.is_some(),
            self.pitch.is_some(),
            self.yaw.is_some()
        );
        Ok(())
    }

    fn set_smoke_fan(&mut self, on: bool) -> Result<(), OutputError> {
        set_switch(self.fan.as_mut(), on);
        Ok(())
    }

    fn set_smoke_heater(&mut self, on: bool) -> Result<(), OutputError> {
        set_switch(self.heater.as_mut(), on);
        Ok(())
    }

    fn set_nozzle_flash(&mut self, on: bool) -> Result<(), OutputError> {
        set_switch(self.flash.as_mut(), on);
        Ok(())
    }

    fn write_servo(&mut self, axis: ServoAxisId, pulse_us: i32) -> Result<(), OutputError> {
        let servo = match axis {
            ServoAxisId::Pitch => self.pitch.as_ref(),
            ServoAxisId::Yaw => self.yaw.as_ref(),
        };
        match servo {
            Some(servo) => servo
                .pwm
                .set_pulse_width(pulse_width(pulse_us))
                .map_err(|e| OutputError::Io(format!("PWM {}: {e}", servo.channel))),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self) -> Result<(), OutputError> {
        for switch in [&mut self.fan, &mut self.heater, &mut self.flash]
            .into_iter()
            .flatten()
        {
            switch.set(false);
        }

        let mut result = Ok(());
        for servo in [&self.pitch, &self.yaw].into_iter().flatten() {
            if let Err(e) = servo.pwm.disable() {
                warn!("PWM {}: {}", servo.channel, e);
                result = Err(OutputError::Io(format!("PWM {}: {e}", servo.channel)));
            }
        }

        // Dropping the pins hands them back to the kernel.
        self.fan = None;
        self.heater = None;
        self.flash = None;
        self.pitch = None;
        self.yaw = None;
        info!("GPIO outputs released");
        result
    }
}

/// Factory function to create a GPIO driver instance.
pub fn create_driver() -> Box<dyn OutputDriver> {
    Box::new(GpioOutput::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_numbers_map_to_pwm_channels() {
        assert!(matches!(pwm_channel(0), Ok(Channel::Pwm0)));
        assert!(matches!(pwm_channel(1), Ok(Channel::Pwm1)));
        assert!(matches!(pwm_channel(3), Ok(Channel::Pwm3)));
        assert!(matches!(pwm_channel(4), Err(OutputError::InitFailed(_))));
    }

    #[test]
    fn pulse_width_is_limited_to_one_frame() {
        assert_eq!(pulse_width(1500), Duration::from_micros(1500));
        assert_eq!(pulse_width(-20), Duration::ZERO);
        assert_eq!(pulse_width(25_000), SERVO_PERIOD);
    }

    #[test]
    fn invalid_servo_channel_fails_init() {
        let mut config = HeliFxConfig::default();
        config.gun.pitch_servo.enabled = true;
        config.gun.pitch_servo.pwm_channel = Some(9);

        let mut driver = GpioOutput::new();
        assert!(matches!(
            driver.init(&config),
            Err(OutputError::InitFailed(_))
        ));
    }

    #[test]
    fn nothing_configured_claims_nothing() {
        let mut driver = GpioOutput::new();
        driver.init(&HeliFxConfig::default()).unwrap();
        assert!(driver.fan.is_none());
        assert!(driver.pitch.is_none());
    }

    #[test]
    fn unclaimed_outputs_are_no_ops() {
        let mut driver = GpioOutput::new();
        assert!(driver.set_smoke_fan(true).is_ok());
        assert!(driver.write_servo(ServoAxisId::Pitch, 1500).is_ok());
        assert!(driver.shutdown().is_ok());
    }
}
