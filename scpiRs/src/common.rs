//! Common commands that every SCPI instrument understands (IEEE 488.2).

use std::thread;

use crate::{Response, ScpiError, Transactor, Transport, Value};

impl<T: Transport> Transactor<T> {
    /// Send a query and return its response, which is required to be there.
    ///
    /// This is [`Transactor::command`] for queries whose answer is needed. A query that does not
    /// receive a reply results in [`ScpiError::NoResponse`].
    pub fn query(&mut self, args: &[Value]) -> Result<Response, ScpiError> {
        self.command(args)?.ok_or_else(|| ScpiError::NoResponse {
            query: args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        })
    }

    /// Query the identification of the instrument with `*IDN?`.
    ///
    /// Usually this is a list of manufacturer, model, serial number, and firmware version.
    pub fn get_identification(&mut self) -> Result<Response, ScpiError> {
        self.query(&["*IDN?".into()])
    }

    /// Query the standard event status register with `*ESR?`.
    ///
    /// Reading the register clears it. Refer to the manual of your instrument for the meaning of
    /// the individual bits.
    pub fn get_status(&mut self) -> Result<i64, ScpiError> {
        self.query(&["*ESR?".into()])?.to_i64()
    }

    /// Query if all pending operations are complete with `*OPC?`.
    pub fn is_ready(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(&["*OPC?".into()])?.to_i64()? == 1)
    }

    /// Clear the status registers with `*CLS` and return the status register afterwards.
    pub fn clear_errors(&mut self) -> Result<i64, ScpiError> {
        self.write_line(&["*CLS".into()])?;
        self.get_status()
    }

    /// Query if the status registers are cleared when the instrument powers up (`*PSC?`).
    pub fn get_power_on_clear_status(&mut self) -> Result<bool, ScpiError> {
        Ok(self.query(&["*PSC?".into()])?.to_i64()? != 0)
    }

    /// Set if the status registers are cleared when the instrument powers up.
    ///
    /// Returns the setting that the instrument reports afterwards.
    pub fn set_power_on_clear_status(&mut self, clear: bool) -> Result<bool, ScpiError> {
        self.write_line(&["*PSC".into(), Value::Int(i64::from(clear))])?;
        self.get_power_on_clear_status()
    }

    /// Reset the instrument with `*RST`.
    ///
    /// Waits for the reset delay (see [`Transactor::set_reset_delay`]) and then returns whether
    /// the instrument reports all operations as complete.
    pub fn reset(&mut self) -> Result<bool, ScpiError> {
        self.write_line(&["*RST".into()])?;
        thread::sleep(self.get_reset_delay());
        self.is_ready()
    }
}
