//! Shared I2C bus arbitration
//!
//! The potentiostat, the humidity/temperature sensor and the ADC all sit on
//! one physical I2C bus. [`BusArbiter`] owns that bus and guarantees that at
//! most one transaction is in flight at any time: every access is bracketed
//! by an acquire, which binds the target address and marks the bus busy, and
//! a release, which clears it again.
//!
//! Contention is resolved by schedule order, not by priority. A requester
//! that finds the bus busy either gets [`nb::Error::WouldBlock`] from
//! [`BusArbiter::try_acquire`] or yields to the executor in
//! [`BusArbiter::acquire`] until the current holder releases.
//!
//! Drivers do not talk to the arbiter directly. Each one gets an
//! [`ArbitratedDevice`], which implements the blocking and async
//! embedded-hal I2C traits on top of the arbiter.
//!
//! # Example
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use gas_core::i2c_bus::BusArbiter;
//!
//! # fn demo<I: embedded_hal::i2c::I2c>(i2c: I) {
//! let arbiter = BusArbiter::<NoopRawMutex, _>::new(i2c);
//!
//! let potentiostat_i2c = arbiter.device();
//! let adc_i2c = arbiter.device();
//! # }
//! ```

use core::cell::{Cell, RefCell, RefMut};
use core::convert::Infallible;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
use log::trace;

/// Owner of the single physical I2C bus.
///
/// The busy flag is the address bound by the current holder, kept behind an
/// embassy blocking mutex. The bus itself sits in a `RefCell` and is only
/// touched through a [`BusGuard`], so the arbiter is `!Sync`: it is shared
/// by reference between the drivers of a single task, never across
/// interrupt or thread boundaries.
pub struct BusArbiter<M: RawMutex, T> {
    owner: Mutex<M, Cell<Option<u8>>>,
    bus: RefCell<T>,
}

impl<M: RawMutex, T> BusArbiter<M, T> {
    pub const fn new(bus: T) -> Self {
        Self {
            owner: Mutex::new(Cell::new(None)),
            bus: RefCell::new(bus),
        }
    }

    /// Address bound by the transaction currently in flight, if any.
    pub fn owner(&self) -> Option<u8> {
        self.owner.lock(|owner| owner.get())
    }

    pub fn is_busy(&self) -> bool {
        self.owner().is_some()
    }

    /// Claim the bus for `address` without waiting.
    pub fn try_acquire(&self, address: u8) -> nb::Result<BusGuard<'_, M, T>, Infallible> {
        let claimed = self.owner.lock(|owner| {
            if owner.get().is_some() {
                false
            } else {
                owner.set(Some(address));
                true
            }
        });

        if claimed {
            trace!("i2c bus: acquired for 0x{:02x}", address);
            Ok(BusGuard {
                arbiter: self,
                address,
            })
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Claim the bus for `address`, yielding to the executor while another
    /// transaction is in flight.
    pub async fn acquire(&self, address: u8) -> BusGuard<'_, M, T> {
        loop {
            match self.try_acquire(address) {
                Ok(guard) => return guard,
                Err(nb::Error::WouldBlock) => embassy_futures::yield_now().await,
                Err(nb::Error::Other(never)) => match never {},
            }
        }
    }

    /// Handle for one peripheral driver.
    pub const fn device(&self) -> ArbitratedDevice<'_, M, T> {
        ArbitratedDevice::new(self)
    }

    fn release(&self) {
        self.owner.lock(|owner| {
            if let Some(address) = owner.take() {
                trace!("i2c bus: released by 0x{:02x}", address);
            }
        });
    }
}

/// Exclusive claim on the bus, bound to one device address.
///
/// The bus is released when the guard is dropped.
pub struct BusGuard<'a, M: RawMutex, T> {
    arbiter: &'a BusArbiter<M, T>,
    address: u8,
}

impl<M: RawMutex, T> BusGuard<'_, M, T> {
    /// Device address bound at acquire time.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Access to the underlying bus for the duration of the claim.
    pub fn bus(&self) -> RefMut<'_, T> {
        self.arbiter.bus.borrow_mut()
    }

    /// Clear the busy flag.
    pub fn release(self) {}
}

impl<M: RawMutex, T> Drop for BusGuard<'_, M, T> {
    fn drop(&mut self) {
        self.arbiter.release();
    }
}

/// Errors reported by an [`ArbitratedDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationError<E> {
    /// Another transaction was in flight
    Busy,
    /// The transfer itself failed
    Bus(E),
}

impl<E: embedded_hal::i2c::Error> embedded_hal::i2c::Error for ArbitrationError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy => ErrorKind::ArbitrationLoss,
            Self::Bus(e) => e.kind(),
        }
    }
}

/// Per-driver view of the shared bus.
///
/// Every operation acquires the bus for its address first and releases it
/// when the transfer completes, so bytes of two devices never interleave.
/// The blocking implementation fails with [`ArbitrationError::Busy`] instead
/// of waiting; the async implementation yields until the bus is free.
pub struct ArbitratedDevice<'a, M: RawMutex, T> {
    arbiter: &'a BusArbiter<M, T>,
}

impl<'a, M: RawMutex, T> ArbitratedDevice<'a, M, T> {
    #[inline]
    pub const fn new(arbiter: &'a BusArbiter<M, T>) -> Self {
        Self { arbiter }
    }

    fn claim<E>(&self, address: u8) -> Result<BusGuard<'a, M, T>, ArbitrationError<E>> {
        self.arbiter
            .try_acquire(address)
            .map_err(|_| ArbitrationError::Busy)
    }
}

impl<M: RawMutex, T> ErrorType for ArbitratedDevice<'_, M, T>
where
    T: ErrorType,
{
    type Error = ArbitrationError<T::Error>;
}

impl<M: RawMutex, T> embedded_hal::i2c::I2c for ArbitratedDevice<'_, M, T>
where
    T: embedded_hal::i2c::I2c,
{
    #[inline]
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        let guard = self.claim(address)?;
        let result = embedded_hal::i2c::I2c::read(&mut *guard.bus(), address, read);
        result.map_err(ArbitrationError::Bus)
    }

    #[inline]
    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        let guard = self.claim(address)?;
        let result = embedded_hal::i2c::I2c::write(&mut *guard.bus(), address, write);
        result.map_err(ArbitrationError::Bus)
    }

    #[inline]
    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        let guard = self.claim(address)?;
        let result = embedded_hal::i2c::I2c::write_read(&mut *guard.bus(), address, write, read);
        result.map_err(ArbitrationError::Bus)
    }

    #[inline]
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let guard = self.claim(address)?;
        let result = embedded_hal::i2c::I2c::transaction(&mut *guard.bus(), address, operations);
        result.map_err(ArbitrationError::Bus)
    }
}

impl<M: RawMutex, T> embedded_hal_async::i2c::I2c for ArbitratedDevice<'_, M, T>
where
    T: embedded_hal_async::i2c::I2c,
{
    /// Reads bytes once the bus is free, yielding to the executor while it
    /// is held by another device.
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        let guard = self.arbiter.acquire(address).await;
        let mut bus = guard.bus();
        let result = embedded_hal_async::i2c::I2c::read(&mut *bus, address, read).await;
        result.map_err(ArbitrationError::Bus)
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        let guard = self.arbiter.acquire(address).await;
        let mut bus = guard.bus();
        let result = embedded_hal_async::i2c::I2c::write(&mut *bus, address, write).await;
        result.map_err(ArbitrationError::Bus)
    }

    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        let guard = self.arbiter.acquire(address).await;
        let mut bus = guard.bus();
        let result = embedded_hal_async::i2c::I2c::write_read(&mut *bus, address, write, read).await;
        result.map_err(ArbitrationError::Bus)
    }

    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let guard = self.arbiter.acquire(address).await;
        let mut bus = guard.bus();
        let result = embedded_hal_async::i2c::I2c::transaction(&mut *bus, address, operations).await;
        result.map_err(ArbitrationError::Bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal::i2c::{Error as _, I2c};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const POTENTIOSTAT: u8 = 0x48;
    const ADC: u8 = 0x68;

    #[test]
    fn test_second_acquire_waits_for_release() {
        let expectations = [
            Transaction::write(POTENTIOSTAT, vec![0x01, 0x00]),
            Transaction::write(POTENTIOSTAT, vec![0x10, 0x0F]),
            Transaction::read(ADC, vec![0x00, 0x01, 0x02, 0x1C]),
        ];
        let mut mock = I2cMock::new(&expectations);
        let arbiter = BusArbiter::<NoopRawMutex, _>::new(mock.clone());

        let first = arbiter.try_acquire(POTENTIOSTAT).unwrap();
        assert_eq!(arbiter.owner(), Some(POTENTIOSTAT));
        assert!(matches!(arbiter.try_acquire(ADC), Err(nb::Error::WouldBlock)));

        let mut adc = arbiter.device();
        let mut buf = [0u8; 4];
        let err = adc.read(ADC, &mut buf).unwrap_err();
        assert_eq!(err, ArbitrationError::Busy);
        assert_eq!(err.kind(), ErrorKind::ArbitrationLoss);

        first.bus().write(POTENTIOSTAT, &[0x01, 0x00]).unwrap();
        first.bus().write(POTENTIOSTAT, &[0x10, 0x0F]).unwrap();
        first.release();
        assert!(!arbiter.is_busy());

        adc.read(ADC, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x01, 0x02, 0x1C]);
        assert!(!arbiter.is_busy());

        mock.done();
    }

    #[test]
    fn test_cooperative_acquire_does_not_interleave() {
        let expectations = [
            Transaction::write(POTENTIOSTAT, vec![0x01, 0x00]),
            Transaction::write(POTENTIOSTAT, vec![0x12, 0x03]),
            Transaction::write(ADC, vec![0x1C]),
        ];
        let mut mock = I2cMock::new(&expectations);
        let arbiter = BusArbiter::<NoopRawMutex, _>::new(mock.clone());

        let first = async {
            let guard = arbiter.acquire(POTENTIOSTAT).await;
            guard.bus().write(POTENTIOSTAT, &[0x01, 0x00]).unwrap();
            embassy_futures::yield_now().await;
            guard.bus().write(POTENTIOSTAT, &[0x12, 0x03]).unwrap();
        };
        let second = async {
            let guard = arbiter.acquire(ADC).await;
            guard.bus().write(ADC, &[0x1C]).unwrap();
        };

        embassy_futures::block_on(join(first, second));
        assert!(!arbiter.is_busy());

        mock.done();
    }

    #[test]
    fn test_async_device_brackets_each_transfer() {
        let expectations = [Transaction::write_read(
            POTENTIOSTAT,
            vec![0x10],
            vec![0x0F],
        )];
        let mut mock = I2cMock::new(&expectations);
        let arbiter = BusArbiter::<NoopRawMutex, _>::new(mock.clone());
        let mut device = arbiter.device();

        let mut value = [0u8; 1];
        embassy_futures::block_on(embedded_hal_async::i2c::I2c::write_read(
            &mut device,
            POTENTIOSTAT,
            &[0x10],
            &mut value,
        ))
        .unwrap();

        assert_eq!(value, [0x0F]);
        assert!(!arbiter.is_busy());

        mock.done();
    }

    #[test]
    fn test_bus_error_passes_through_and_releases() {
        let expectations =
            [Transaction::write(ADC, vec![0x1C]).with_error(ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            ))];
        let mut mock = I2cMock::new(&expectations);
        let arbiter = BusArbiter::<NoopRawMutex, _>::new(mock.clone());
        let mut device = arbiter.device();

        let err = device.write(ADC, &[0x1C]).unwrap_err();
        assert!(matches!(err, ArbitrationError::Bus(_)));
        assert!(!arbiter.is_busy());

        mock.done();
    }
}
