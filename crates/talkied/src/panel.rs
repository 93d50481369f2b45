//! Raspberry Pi GPIO panel — indicator LEDs and the push-to-talk button.

use std::sync::Mutex;

use rppal::gpio::{Gpio, InputPin, Level, OutputPin};

use talkie_core::config::PanelConfig;
use talkie_services::{DeviceError, Panel};

pub struct GpioPanel {
    ok: Mutex<OutputPin>,
    alert: Mutex<OutputPin>,
    button: Mutex<InputPin>,
}

impl GpioPanel {
    pub fn open(config: &PanelConfig) -> Result<Self, DeviceError> {
        let gpio = Gpio::new().map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        let ok = gpio
            .get(config.ok_pin)
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?
            .into_output_low();
        let alert = gpio
            .get(config.alert_pin)
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?
            .into_output_low();
        let button = gpio
            .get(config.button_pin)
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?
            .into_input_pullup();
        Ok(Self {
            ok: Mutex::new(ok),
            alert: Mutex::new(alert),
            button: Mutex::new(button),
        })
    }
}

fn drive(pin: &Mutex<OutputPin>, on: bool) {
    let mut pin = pin.lock().expect("gpio pin lock poisoned");
    if on {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

impl Panel for GpioPanel {
    fn set_ok(&self, on: bool) {
        drive(&self.ok, on);
    }

    fn set_alert(&self, on: bool) {
        drive(&self.alert, on);
    }

    fn talk_pressed(&self) -> bool {
        // Pull-up wiring: pressing the button shorts the pin to ground.
        let button = self.button.lock().expect("gpio pin lock poisoned");
        button.read() == Level::Low
    }
}
