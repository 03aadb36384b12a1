//! Simulated measurement bus shared by the integration tests

#![allow(dead_code)]

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use gas_core::config::{HDC1080_ADDRESS, LMP91000_ADDRESS, MCP3423_ADDRESS};
use gas_core::i2c_bus::BusArbiter;

pub type Arbiter = BusArbiter<NoopRawMutex, SimBus>;

/// The three peripherals behind one I2C bus.
#[derive(Debug)]
pub struct SimBus {
    pub potentiostat_registers: [u8; 0x13],
    pointer: u8,
    pub climate_configuration: Option<u16>,
    pub climate_triggers: usize,
    pub temperature_raw: u16,
    pub humidity_raw: u16,
    pub adc_configuration: Option<u8>,
    /// 18-bit register value as the ADC would return it
    pub adc_raw: u32,
    pub adc_ready: bool,
    pub adc_fault: bool,
    /// Address of every transaction in bus order
    pub transactions: Vec<u8>,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            potentiostat_registers: [0; 0x13],
            pointer: 0,
            climate_configuration: None,
            climate_triggers: 0,
            temperature_raw: 0,
            humidity_raw: 0,
            adc_configuration: None,
            adc_raw: 0,
            adc_ready: false,
            adc_fault: false,
            transactions: Vec::new(),
        }
    }

    fn write_to(&mut self, address: u8, bytes: &[u8]) -> Result<(), ErrorKind> {
        match (address, bytes) {
            (LMP91000_ADDRESS, [register]) => self.pointer = *register,
            (LMP91000_ADDRESS, [register, value]) => {
                let slot = self
                    .potentiostat_registers
                    .get_mut(usize::from(*register))
                    .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data))?;
                *slot = *value;
            }
            (HDC1080_ADDRESS, [0x02, high, low]) => {
                self.climate_configuration = Some(u16::from_be_bytes([*high, *low]));
            }
            (HDC1080_ADDRESS, [0x00]) => self.climate_triggers += 1,
            (MCP3423_ADDRESS, [configuration]) => self.adc_configuration = Some(*configuration),
            _ => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        }
        Ok(())
    }

    fn read_from(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        match address {
            LMP91000_ADDRESS => {
                let value = self.potentiostat_registers[usize::from(self.pointer)];
                buffer.fill(value);
            }
            HDC1080_ADDRESS => {
                let [t0, t1] = self.temperature_raw.to_be_bytes();
                let [h0, h1] = self.humidity_raw.to_be_bytes();
                for (slot, byte) in buffer.iter_mut().zip([t0, t1, h0, h1]) {
                    *slot = byte;
                }
            }
            MCP3423_ADDRESS => {
                if self.adc_fault {
                    return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                }
                let configuration = self.adc_configuration.unwrap_or(0);
                let status = if self.adc_ready {
                    configuration & 0x7F
                } else {
                    configuration | 0x80
                };
                let data = [
                    ((self.adc_raw >> 16) & 0x03) as u8,
                    (self.adc_raw >> 8) as u8,
                    self.adc_raw as u8,
                    status,
                ];
                for (slot, byte) in buffer.iter_mut().zip(data) {
                    *slot = byte;
                }
            }
            _ => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
        }
        Ok(())
    }
}

impl ErrorType for SimBus {
    type Error = ErrorKind;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.transactions.push(address);
        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.write_to(address, bytes)?,
                Operation::Read(buffer) => self.read_from(address, buffer)?,
            }
        }
        Ok(())
    }
}

/// Run `f` on the simulated bus while it is idle.
pub fn with_bus<M: RawMutex, R>(
    arbiter: &BusArbiter<M, SimBus>,
    f: impl FnOnce(&mut SimBus) -> R,
) -> R {
    let guard = arbiter
        .try_acquire(0x00)
        .unwrap_or_else(|_| panic!("bus is busy"));
    let mut bus = guard.bus();
    let result = f(&mut bus);
    drop(bus);
    result
}
