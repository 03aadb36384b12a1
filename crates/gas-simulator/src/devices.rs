//! Simulated peripherals behind the shared bus

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use gas_core::DeviceConfig;
use gas_core::sensors::FULL_SCALE;
use log::trace;

/// Gas, temperature and humidity signals that drift slowly over time.
struct Environment {
    elapsed_secs: f64,
}

impl Environment {
    /// ADC count above which the simulated sensor sees gas
    const ZERO_COUNT: f64 = 107_292.0;

    fn temperature_celsius(&self) -> f64 {
        let t = self.elapsed_secs;
        24.0 + 2.0 * (t / 90.0).sin() + 0.3 * (t / 13.0).cos()
    }

    fn humidity_percent(&self) -> f64 {
        let t = self.elapsed_secs;
        45.0 + 8.0 * (t / 150.0).sin()
    }

    /// Inverted 18-bit count, as stored by the core.
    fn adc_count(&self) -> f64 {
        let t = self.elapsed_secs;
        Self::ZERO_COUNT + 40_000.0 * (0.5 + 0.5 * (t / 60.0).sin())
    }
}

/// LMP91000, HDC1080 and MCP3423 on one bus.
pub struct SimulatedBus {
    config: DeviceConfig,
    environment: Environment,
    potentiostat_registers: [u8; 0x13],
    pointer: u8,
    conversion_started_secs: Option<f64>,
    adc_sample_secs: f64,
    adc_sample_read: bool,
}

impl SimulatedBus {
    /// The MCP3423 finishes a conversion every 1/3.75 s in 18-bit mode.
    const ADC_CONVERSION_SECS: f64 = 1.0 / 3.75;

    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            environment: Environment { elapsed_secs: 0.0 },
            potentiostat_registers: [0; 0x13],
            pointer: 0,
            conversion_started_secs: None,
            adc_sample_secs: 0.0,
            adc_sample_read: false,
        }
    }

    pub fn advance(&mut self, dt_secs: f64) {
        self.environment.elapsed_secs += dt_secs;
        let now = self.environment.elapsed_secs;
        if now - self.adc_sample_secs >= Self::ADC_CONVERSION_SECS {
            self.adc_sample_secs = now;
            self.adc_sample_read = false;
        }
    }

    pub fn potentiostat_register(&self, register: u8) -> Option<u8> {
        self.potentiostat_registers.get(usize::from(register)).copied()
    }

    fn write_to(&mut self, address: u8, bytes: &[u8]) -> Result<(), ErrorKind> {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data);

        if address == self.config.potentiostat_address {
            match bytes {
                [register] => self.pointer = *register,
                [register, value] => {
                    let slot = self
                        .potentiostat_registers
                        .get_mut(usize::from(*register))
                        .ok_or(nack)?;
                    *slot = *value;
                }
                _ => return Err(nack),
            }
        } else if address == self.config.climate_address {
            match bytes {
                [0x00] => self.conversion_started_secs = Some(self.environment.elapsed_secs),
                [0x02, _, _] => {}
                _ => return Err(nack),
            }
        } else if address == self.config.adc_address {
            if bytes.len() != 1 {
                return Err(nack);
            }
        } else {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        trace!("sim: write 0x{:02x} {:02x?}", address, bytes);
        Ok(())
    }

    fn read_from(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        if address == self.config.potentiostat_address {
            let value = self.potentiostat_registers[usize::from(self.pointer) % 0x13];
            buffer.fill(value);
        } else if address == self.config.climate_address {
            // Reading before the conversion finished is NACKed by the device
            if self.conversion_started_secs.take().is_none() {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            let temperature = (self.environment.temperature_celsius() + 40.0) / 165.0 * 65536.0;
            let humidity = self.environment.humidity_percent() / 100.0 * 65536.0;
            let [t0, t1] = (temperature as u16).to_be_bytes();
            let [h0, h1] = (humidity as u16).to_be_bytes();
            for (slot, byte) in buffer.iter_mut().zip([t0, t1, h0, h1]) {
                *slot = byte;
            }
        } else if address == self.config.adc_address {
            let raw = FULL_SCALE - (self.environment.adc_count() as u32).min(FULL_SCALE);
            let status = if self.adc_sample_read { 0x9C } else { 0x1C };
            self.adc_sample_read = true;
            let data = [((raw >> 16) & 0x03) as u8, (raw >> 8) as u8, raw as u8, status];
            for (slot, byte) in buffer.iter_mut().zip(data) {
                *slot = byte;
            }
        } else {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        trace!("sim: read 0x{:02x} {:02x?}", address, buffer);
        Ok(())
    }
}

impl ErrorType for SimulatedBus {
    type Error = ErrorKind;
}

impl I2c for SimulatedBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.write_to(address, bytes)?,
                Operation::Read(buffer) => self.read_from(address, buffer)?,
            }
        }
        Ok(())
    }
}
