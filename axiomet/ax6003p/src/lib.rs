//! A rust driver for the AXIOMET AX-6003P programmable power supply.
//!
//! The AX-6003P is a single output power supply with absolute maximum ratings of 60 V and 3 A. It
//! is connected via USB, which shows up as a serial port, and echoes every command it receives
//! before it replies. This driver provides all functionality of the power supply.
//!
//! # Example
//!
//! This example shows the usage via the serial interface.
//! ```no_run
//! use axiomet_ax6003p::{Ax6003p, SerialInterfaceAx6003p};
//! use measurements::{Current, Voltage};
//!
//! let serial_inst = SerialInterfaceAx6003p::simple("/dev/ttyUSB0").unwrap();
//! let mut inst = Ax6003p::try_new(serial_inst).unwrap();
//!
//! println!("Instrument name: {}", inst.get_name().unwrap());
//!
//! inst.set_apply(Voltage::from_volts(5.0), Current::from_amperes(0.5)).unwrap();
//! inst.set_output(true).unwrap();
//! println!("Output voltage: {}", inst.measure_voltage().unwrap());
//! ```
//!
//! Measured values can be post-processed with a calibration polynomial:
//!
//! ```no_run
//! # use axiomet_ax6003p::{Ax6003p, SerialInterfaceAx6003p};
//! use scpirs::Calibrations;
//!
//! # let mut inst = Ax6003p::try_new(SerialInterfaceAx6003p::simple("/dev/ttyUSB0").unwrap()).unwrap();
//! let cal = Calibrations::load_or_default("cal_data.json").unwrap();
//! let raw = inst.measure_voltage().unwrap().as_volts();
//! println!("Calibrated voltage: {} V", cal.evaluate("equ", raw).unwrap());
//! ```

#![deny(warnings, missing_docs)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use measurements::{Current, Power, Voltage};
use scpirs::{Response, ScpiError, SerialSession, Transactor, Transport, Value};

/// Absolute maximum output voltage in V.
pub const MAX_VOLTAGE: f64 = 60.0;

/// Absolute maximum output current in A.
pub const MAX_CURRENT: f64 = 3.0;

/// A serial interface for the AX-6003P.
#[derive(Debug)]
pub struct SerialInterfaceAx6003p {}

impl SerialInterfaceAx6003p {
    /// Try to open the serial port the AX-6003P is connected to.
    ///
    /// The power supply communicates at 9600 baud, 8N1.
    ///
    /// Arguments:
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    pub fn simple(port: &str) -> Result<SerialSession, ScpiError> {
        SerialSession::simple(port, 9600)
    }
}

/// A rust driver for the AX-6003P.
///
/// Every setter sends the new value and then queries the instrument for the value it actually
/// applied, which is returned. See the top-level documentation for an example.
pub struct Ax6003p<T: Transport> {
    interface: Arc<Mutex<Transactor<T>>>,
}

impl<T: Transport> Ax6003p<T> {
    /// Create a new AX-6003P instance with the given transport.
    ///
    /// The timeout of the transport is set to one second and anything that is left in its
    /// receive buffer is discarded.
    ///
    /// # Arguments
    /// * `interface` - A transport that implements the [`Transport`] trait.
    pub fn try_new(interface: T) -> Result<Self, ScpiError> {
        let mut scpi = Transactor::new(interface);
        scpi.transport_mut().set_timeout(Duration::from_secs(1))?;
        let _ = scpi.transport_mut().read_all_buffered()?;

        Ok(Ax6003p {
            interface: Arc::new(Mutex::new(scpi)),
        })
    }

    /// Set the delay between the bus going idle and sending the next command.
    pub fn set_settle_delay(&mut self, delay: Duration) {
        self.lock().set_settle_delay(delay);
    }

    /// Set the time to wait after a reset before the power supply is queried again.
    pub fn set_reset_delay(&mut self, delay: Duration) {
        self.lock().set_reset_delay(delay);
    }

    /// Query the name of the instrument.
    pub fn get_name(&mut self) -> Result<String, ScpiError> {
        Ok(self.lock().get_identification()?.to_string())
    }

    /// Query the standard event status register.
    pub fn get_status(&mut self) -> Result<i64, ScpiError> {
        self.lock().get_status()
    }

    /// Query if all pending operations are complete.
    pub fn is_ready(&mut self) -> Result<bool, ScpiError> {
        self.lock().is_ready()
    }

    /// Clear the status registers and return the status register afterwards.
    pub fn clear_errors(&mut self) -> Result<i64, ScpiError> {
        self.lock().clear_errors()
    }

    /// Query if the status registers are cleared when the power supply is switched on.
    pub fn get_power_on_clear_status(&mut self) -> Result<bool, ScpiError> {
        self.lock().get_power_on_clear_status()
    }

    /// Set if the status registers are cleared when the power supply is switched on.
    pub fn set_power_on_clear_status(&mut self, clear: bool) -> Result<bool, ScpiError> {
        self.lock().set_power_on_clear_status(clear)
    }

    /// Reset the power supply and return if it reports ready afterwards.
    ///
    /// This takes about seven seconds.
    pub fn reset(&mut self) -> Result<bool, ScpiError> {
        self.lock().reset()
    }

    /// Get the voltage that is currently applied.
    pub fn get_voltage(&mut self) -> Result<Voltage, ScpiError> {
        Ok(Voltage::from_volts(self.query("APPL?")?.f64_at(0)?))
    }

    /// Set the output voltage.
    ///
    /// The voltage must be between 0 and 60 V.
    pub fn set_voltage(&mut self, voltage: Voltage) -> Result<Voltage, ScpiError> {
        let volts = check_range(voltage.as_volts(), MAX_VOLTAGE)?;
        self.sendcmd(&[":VOLT".into(), volts.into()])?;
        self.get_voltage()
    }

    /// Get the current that is currently applied.
    pub fn get_current(&mut self) -> Result<Current, ScpiError> {
        Ok(Current::from_amperes(self.query("APPL?")?.f64_at(1)?))
    }

    /// Set the output current.
    ///
    /// The current must be between 0 and 3 A.
    pub fn set_current(&mut self, current: Current) -> Result<Current, ScpiError> {
        let amps = check_range(current.as_amperes(), MAX_CURRENT)?;
        self.sendcmd(&[":CURR".into(), amps.into()])?;
        self.get_current()
    }

    /// Get the voltage and current that are currently applied.
    pub fn get_apply(&mut self) -> Result<(Voltage, Current), ScpiError> {
        let resp = self.query("APPL?")?;
        Ok((
            Voltage::from_volts(resp.f64_at(0)?),
            Current::from_amperes(resp.f64_at(1)?),
        ))
    }

    /// Set output voltage and current with one command.
    pub fn set_apply(
        &mut self,
        voltage: Voltage,
        current: Current,
    ) -> Result<(Voltage, Current), ScpiError> {
        let volts = check_range(voltage.as_volts(), MAX_VOLTAGE)?;
        let amps = check_range(current.as_amperes(), MAX_CURRENT)?;
        self.sendcmd(&[":APPL".into(), volts.into(), amps.into()])?;
        self.get_apply()
    }

    /// Measure the real-time output voltage.
    pub fn measure_voltage(&mut self) -> Result<Voltage, ScpiError> {
        Ok(Voltage::from_volts(self.query(":MEAS:VOLT?")?.to_f64()?))
    }

    /// Measure the real-time output current.
    pub fn measure_current(&mut self) -> Result<Current, ScpiError> {
        Ok(Current::from_amperes(self.query(":MEAS:CURR?")?.to_f64()?))
    }

    /// Measure the real-time output power.
    pub fn measure_power(&mut self) -> Result<Power, ScpiError> {
        Ok(Power::from_watts(self.query(":MEAS:POWer?")?.to_f64()?))
    }

    /// Get the output state, `true` if the output is on.
    pub fn get_output(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(":OUTP?")?.is_on())
    }

    /// Turn the output on or off.
    pub fn set_output(&mut self, on: bool) -> Result<bool, ScpiError> {
        self.sendcmd(&[":OUTP".into(), on_off(on)])?;
        self.get_output()
    }

    /// Get the delay time after an apply command.
    pub fn get_delay_time(&mut self) -> Result<Duration, ScpiError> {
        let resp = self.query(":SYST:AUTO:DEL?")?;
        Duration::try_from_secs_f64(resp.to_f64()?)
            .map_err(|_| ScpiError::ResponseParseError(resp.to_string()))
    }

    /// Set the delay time after an apply command in full seconds.
    ///
    /// The shortest delay the power supply supports is one second.
    pub fn set_delay_time(&mut self, delay: Duration) -> Result<Duration, ScpiError> {
        let secs = i64::try_from(delay.as_secs()).unwrap_or(i64::MAX);
        if secs < 1 {
            return Err(ScpiError::IntValueOutOfRange {
                value: secs,
                min: 1,
                max: i64::MAX,
            });
        }
        self.sendcmd(&[":SYST:AUTO:DEL".into(), secs.into()])?;
        self.get_delay_time()
    }

    /// Get the current protection level.
    pub fn get_current_protection_level(&mut self) -> Result<Current, ScpiError> {
        Ok(Current::from_amperes(
            self.query(":CURR:PROT:LEV?")?.to_f64()?,
        ))
    }

    /// Set the current at which the current protection trips.
    pub fn set_current_protection_level(&mut self, current: Current) -> Result<Current, ScpiError> {
        let amps = check_range(current.as_amperes(), MAX_CURRENT)?;
        self.sendcmd(&[":CURR:PROT:LEV".into(), amps.into()])?;
        self.get_current_protection_level()
    }

    /// Get if the current protection is enabled.
    pub fn get_current_protection_state(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(":CURR:PROT:STAT?")?.is_on())
    }

    /// Enable or disable the current protection.
    pub fn set_current_protection_state(&mut self, on: bool) -> Result<bool, ScpiError> {
        self.sendcmd(&[":CURR:PROT:STAT".into(), on_off(on)])?;
        self.get_current_protection_state()
    }

    /// Check if the current protection has tripped.
    pub fn is_current_protection_tripped(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(":CURR:PROT:TRIP?")?.is_on())
    }

    /// Clear a tripped current protection.
    ///
    /// Returns `true` if the protection is still tripped afterwards.
    pub fn clear_current_protection(&mut self) -> Result<bool, ScpiError> {
        self.lock().command(&[":CURR:PROT:CLE".into()])?;
        self.is_current_protection_tripped()
    }

    /// Get the voltage protection level.
    pub fn get_voltage_protection_level(&mut self) -> Result<Voltage, ScpiError> {
        Ok(Voltage::from_volts(self.query(":VOLT:PROT:LEV?")?.to_f64()?))
    }

    /// Set the voltage at which the voltage protection trips.
    pub fn set_voltage_protection_level(&mut self, voltage: Voltage) -> Result<Voltage, ScpiError> {
        let volts = check_range(voltage.as_volts(), MAX_VOLTAGE)?;
        self.sendcmd(&[":VOLT:PROT:LEV".into(), volts.into()])?;
        self.get_voltage_protection_level()
    }

    /// Get if the voltage protection is enabled.
    pub fn get_voltage_protection_state(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(":VOLT:PROT:STAT?")?.is_on())
    }

    /// Enable or disable the voltage protection.
    pub fn set_voltage_protection_state(&mut self, on: bool) -> Result<bool, ScpiError> {
        self.sendcmd(&[":VOLT:PROT:STAT".into(), on_off(on)])?;
        self.get_voltage_protection_state()
    }

    /// Check if the voltage protection has tripped.
    pub fn is_voltage_protection_tripped(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(":VOLT:PROT:TRIP?")?.is_on())
    }

    /// Clear a tripped voltage protection.
    ///
    /// Returns `true` if the protection is still tripped afterwards.
    pub fn clear_voltage_protection(&mut self) -> Result<bool, ScpiError> {
        self.lock().command(&[":VOLT:PROT:CLE".into()])?;
        self.is_voltage_protection_tripped()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Transactor<T>> {
        self.interface.lock().expect("Mutex should not be poisoned")
    }

    /// Send a command to the instrument without waiting for a reply.
    fn sendcmd(&mut self, args: &[Value]) -> Result<(), ScpiError> {
        log::debug!("AX-6003P <- {args:?}");
        self.lock().write_line(args)
    }

    /// Query the instrument with a command and return the response.
    fn query(&mut self, cmd: &str) -> Result<Response, ScpiError> {
        self.lock().query(&[cmd.into()])
    }
}

impl<T: Transport> Clone for Ax6003p<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
        }
    }
}

/// Check that a value lies in `[0, max]` and return it.
fn check_range(value: f64, max: f64) -> Result<f64, ScpiError> {
    if (0.0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ScpiError::FloatValueOutOfRange {
            value,
            min: 0.0,
            max,
        })
    }
}

fn on_off(on: bool) -> Value {
    if on { "ON".into() } else { "OFF".into() }
}
