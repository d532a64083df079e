//! Driver behaviour against the mock bus, as the collector uses it.

use accel_driver_h3lis331::mock::{MockBusProvider, MockI2cBus};
use accel_driver_h3lis331::registers::{CTRL_REG1, CTRL_REG2, CTRL_REG3, CTRL_REG4};
use accel_driver_h3lis331::{BusProvider, H3lis331, SensorError};
use tracing_test::traced_test;

#[test]
fn test_two_sensors_share_one_bus() {
    let shared = MockI2cBus::new();
    shared.add_sensor(0x19);
    shared.add_sensor(0x18);
    shared.set_axes_g(0x19, [0.0, 0.0, 1.0]);
    shared.set_axes_g(0x18, [15.0, 0.0, 0.0]);

    let mut provider = MockBusProvider::new(shared.clone());
    let mut bus = provider.open().unwrap();

    let a = H3lis331::new(0x19);
    let b = H3lis331::new(0x18);
    for sensor in [a, b] {
        sensor.probe(&mut bus).unwrap();
        sensor.configure(&mut bus, 1000).unwrap();
    }

    let sa = a.read(&mut bus, 100.0).unwrap();
    let sb = b.read(&mut bus, 100.0).unwrap();
    assert!((sa.magnitude() - 0.98).abs() < 0.01);
    assert!((sb.ax - 14.994).abs() < 0.01);
}

#[test]
fn test_configuration_sequence() {
    let mut bus = MockI2cBus::new();
    bus.add_sensor(0x19);
    H3lis331::new(0x19).configure(&mut bus, 100).unwrap();

    assert_eq!(
        bus.writes(0x19),
        vec![
            (CTRL_REG1, 0x2F),
            (CTRL_REG4, 0x80),
            (CTRL_REG2, 0x00),
            (CTRL_REG3, 0x00)
        ]
    );
}

#[test]
#[traced_test]
fn test_absent_sensor_is_logged_not_fatal() {
    let mut bus = MockI2cBus::new();
    bus.add_sensor(0x19);

    assert!(H3lis331::new(0x19).identify(&mut bus));
    assert!(!H3lis331::new(0x18).identify(&mut bus));
    assert!(logs_contain("Sensor not detected"));
}

#[test]
fn test_wedged_bus_fails_every_read() {
    let mut bus = MockI2cBus::new();
    bus.add_sensor(0x19);
    bus.set_fail_always(true);

    let sensor = H3lis331::new(0x19);
    for _ in 0..3 {
        let err = sensor.read(&mut bus, 0.0).unwrap_err();
        assert!(matches!(err, SensorError::Transport { address: 0x19, .. }));
    }

    bus.set_fail_always(false);
    assert!(sensor.read(&mut bus, 0.0).is_ok());
}
