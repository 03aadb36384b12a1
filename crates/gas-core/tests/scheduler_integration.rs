mod common;

use common::{Arbiter, SimBus, with_bus};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use gas_core::app_state::SensorsState;
use gas_core::concentration::concentration_ppb;
use gas_core::gas::{GasType, TiaGain};
use gas_core::i2c_bus::{ArbitratedDevice, BusArbiter};
use gas_core::reporting::ReportConfig;
use gas_core::storage::{CalibrationRecord, CalibrationRequest, MemoryPageStore};
use gas_core::time::ManualClock;
use gas_core::{DeviceConfig, PollScheduler, SchedulerState};

type Device<'a, M> = ArbitratedDevice<'a, M, SimBus>;
type Scheduler<'a, M> = PollScheduler<Device<'a, M>, MemoryPageStore<2>, &'a ManualClock>;

/// Raw register value that inverts to a count of 150000.
const RAW_150000: u32 = 262_143 - 150_000;
/// Raw HDC1080 temperature word for 25.00 °C.
const RAW_25_00: u16 = 25818;

fn scheduler<'a, M: RawMutex>(
    arbiter: &'a BusArbiter<M, SimBus>,
    store: MemoryPageStore<2>,
    clock: &'a ManualClock,
) -> Scheduler<'a, M> {
    let config = DeviceConfig::default();
    let sensors = SensorsState::new(arbiter.device(), arbiter.device(), arbiter.device(), &config);
    PollScheduler::new(sensors, store, clock, config)
}

fn run_until_running<M: RawMutex>(scheduler: &mut Scheduler<'_, M>, clock: &ManualClock) {
    while scheduler.step() != SchedulerState::Running {
        clock.advance_ms(5);
    }
}

#[test]
fn test_calibration_update_then_report() {
    env_logger_init();
    let clock = ManualClock::new();
    let arbiter = Arbiter::new(SimBus::new());
    with_bus(&arbiter, |bus| {
        bus.temperature_raw = RAW_25_00;
        bus.humidity_raw = 0x8000;
        bus.adc_raw = RAW_150000;
    });
    let mut scheduler = scheduler(&arbiter, MemoryPageStore::new(), &clock);

    run_until_running(&mut scheduler, &clock);
    scheduler
        .request_calibration(CalibrationRequest {
            adc_count_zero: 107292,
            gas_type: GasType::Co.code(),
            sensitivity: 290,
            ..CalibrationRequest::default()
        })
        .unwrap();

    // Applied on the next tick; the climate conversion starts, the ADC has
    // nothing new yet
    scheduler.step();
    assert!(!scheduler.has_pending_calibration());
    assert_eq!(scheduler.calibration().sensitivity, 290);
    assert_eq!(scheduler.calibration().adc_count_zero, 107292);
    let stored = CalibrationRecord::from_page(&scheduler.store().pages()[1]).unwrap();
    assert_eq!(stored, scheduler.calibration());

    clock.advance_ms(20);
    scheduler.step();
    assert_eq!(scheduler.live_state().temperature, 2500);
    assert_eq!(scheduler.live_state().humidity, 5000);

    with_bus(&arbiter, |bus| bus.adc_ready = true);
    clock.advance_ms(230);
    scheduler.step();
    assert_eq!(scheduler.adc_count(), 150000);

    let live = scheduler.live_state();
    assert_eq!(live.tia_gain, TiaGain::R7k);
    let na = (150000.0 - 107292.0) / 262143.0 * 2.048 / 6903.0 * 1e9;
    let expected = (na - 2.375 * 0.0) * (1.0 - (0.4 / 1000.0) * 0.0) / 290.0 * 1e5;
    assert_eq!(live.concentration_ppb, expected);
    assert_eq!(
        live.concentration_ppb,
        concentration_ppb(150000, 2500, GasType::Co, TiaGain::R7k, 107292, 290)
    );

    scheduler.set_report_config(ReportConfig {
        period_ms: 1000,
        value_has_to_change: true,
    });
    let report = scheduler.poll_report().unwrap();
    assert_eq!(report.gas_concentration, 16_667_292);
    assert_eq!(report.temperature, 2500);
    assert_eq!(report.humidity, 5000);
    assert_eq!(report.gas_type, GasType::Co);

    clock.advance_ms(1000);
    assert_eq!(scheduler.poll_report(), None);
}

#[test]
fn test_cold_start_keeps_running_uncalibrated() {
    env_logger_init();
    let clock = ManualClock::new();
    let arbiter = Arbiter::new(SimBus::new());
    with_bus(&arbiter, |bus| {
        bus.adc_raw = RAW_150000;
        bus.adc_ready = true;
    });
    let mut scheduler = scheduler(&arbiter, MemoryPageStore::new(), &clock);

    assert_eq!(scheduler.calibration(), CalibrationRecord::default());
    run_until_running(&mut scheduler, &clock);
    assert_eq!(scheduler.step(), SchedulerState::Running);

    assert_eq!(scheduler.adc_count(), 150000);
    assert!(!scheduler.live_state().concentration_ppb.is_finite());
    assert_eq!(scheduler.values().gas_concentration, i32::MAX);

    clock.advance_ms(250);
    assert_eq!(scheduler.step(), SchedulerState::Running);
}

#[test]
fn test_stored_calibration_selects_front_end() {
    env_logger_init();
    let clock = ManualClock::new();
    let arbiter = Arbiter::new(SimBus::new());
    let record = CalibrationRecord {
        gas_type: GasType::No2,
        sensitivity: -650,
        ..CalibrationRecord::default()
    };
    let mut store = MemoryPageStore::<2>::new();
    if let Some(page) = store.page_mut(1) {
        *page = record.to_page();
    }

    let mut scheduler = scheduler(&arbiter, store, &clock);
    assert_eq!(scheduler.live_state().gas_type, GasType::No2);
    run_until_running(&mut scheduler, &clock);

    with_bus(&arbiter, |bus| {
        assert_eq!(bus.potentiostat_registers[0x01], 0x00);
        assert_eq!(bus.potentiostat_registers[0x10], 0x0F);
        assert_eq!(bus.potentiostat_registers[0x11], 166);
        assert_eq!(bus.potentiostat_registers[0x12], 3);
        assert_eq!(bus.climate_configuration, Some(0x1000));
        assert_eq!(bus.adc_configuration, Some(0x1C));
        // Potentiostat first, in a fixed order
        assert_eq!(&bus.transactions[..6], &[0x48, 0x48, 0x48, 0x48, 0x40, 0x68]);
    });
}

#[test]
fn test_failed_adc_read_is_retried_on_next_interval() {
    env_logger_init();
    let clock = ManualClock::new();
    // Same flow with the busy flag behind a critical section
    let arbiter = BusArbiter::<CriticalSectionRawMutex, _>::new(SimBus::new());
    with_bus(&arbiter, |bus| {
        bus.adc_raw = RAW_150000;
        bus.adc_ready = true;
        bus.adc_fault = true;
    });
    let mut scheduler = scheduler(&arbiter, MemoryPageStore::new(), &clock);
    run_until_running(&mut scheduler, &clock);

    assert_eq!(scheduler.step(), SchedulerState::Running);
    assert_eq!(scheduler.adc_count(), 0);

    with_bus(&arbiter, |bus| bus.adc_fault = false);
    clock.advance_ms(100);
    scheduler.step();
    assert_eq!(scheduler.adc_count(), 0);

    clock.advance_ms(150);
    scheduler.step();
    assert_eq!(scheduler.adc_count(), 150000);
}

fn env_logger_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
