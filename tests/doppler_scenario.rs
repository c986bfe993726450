#![cfg(test)]


use aiclk::aiclk_core::ArbMax;
use aiclk::aiclk_if::notifier::KERNEL_THROTTLE_ADDRESS;
use aiclk::aiclk_if::LimitReason;
use test_utils::{request, simulation, wide_config};

const GO_BUSY: u32 = 0x52;

#[test]
fn power_limit_activates_doppler() {
    let mut sim = simulation(&wide_config(true), 100);
    assert!(!sim.telemetry().doppler_active);

    sim.board_power_limit(&150u16.to_le_bytes()).unwrap();
    let telemetry = sim.telemetry();
    assert!(telemetry.doppler_active);
    assert_eq!(telemetry.board_power_limit, 150);

    // a zero limit turns it back off
    sim.board_power_limit(&[0, 0]).unwrap();
    assert!(!sim.telemetry().doppler_active);
}

#[test]
fn t3_trip_pins_aiclk_to_fmin() {
    let mut sim = simulation(&wide_config(true), 400);
    sim.request(&request(GO_BUSY, &[]));

    // doppler inactive until the board controller reports a limit
    assert_eq!(sim.step().unwrap().curr_freq, 1400);

    sim.board_power_limit(&150u16.to_le_bytes()).unwrap();

    // 400 W > 2.5 * 150 W, two samples trip T3
    assert_eq!(sim.step().unwrap().curr_freq, 1400);
    let report = sim.step().unwrap();
    assert_eq!(report.curr_freq, 200);
    assert_eq!(report.reason, LimitReason::ArbMax(ArbMax::DopplerCritical));

    let telemetry = sim.telemetry();
    assert!(telemetry.doppler_critical);
    assert!(telemetry.kernel_nops);
    assert_eq!(telemetry.throttle_counter, 1);
    assert_eq!(sim.board().read_tile(KERNEL_THROTTLE_ADDRESS), Some(1));
}

#[test]
fn t2_trip_needs_ten_samples() {
    let mut config = wide_config(true);
    config.feature_enable.doppler_t3_en = Some(false);

    // above 2x but below 2.5x the limit
    let mut sim = simulation(&config, 320);
    sim.request(&request(GO_BUSY, &[]));
    sim.board_power_limit(&150u16.to_le_bytes()).unwrap();

    for _ in 0..9 {
        assert_eq!(sim.step().unwrap().curr_freq, 1400);
    }
    assert!(!sim.telemetry().doppler_critical);

    let report = sim.step().unwrap();
    assert_eq!(report.curr_freq, 200);
    assert_eq!(sim.telemetry().t2_count, 10);
}

#[test]
fn recovery_releases_critical_then_nops() {
    let mut sim = simulation(&wide_config(true), 400);
    sim.request(&request(GO_BUSY, &[]));
    sim.board_power_limit(&150u16.to_le_bytes()).unwrap();
    sim.run(2);
    assert!(sim.telemetry().doppler_critical);

    sim.board_mut().telemetry.input_power = 100;

    // critical clears at once, the no-op latch waits for AICLK to reach fmax
    let report = sim.step().unwrap();
    assert_eq!(report.curr_freq, 1400);
    let telemetry = sim.telemetry();
    assert!(!telemetry.doppler_critical);
    assert!(telemetry.kernel_nops);

    sim.step();
    let telemetry = sim.telemetry();
    assert!(!telemetry.kernel_nops);
    assert_eq!(telemetry.throttle_counter, 2);
    assert_eq!(sim.board().read_tile(KERNEL_THROTTLE_ADDRESS), Some(2));
}

#[test]
fn powered_off_tensix_misses_nops_until_power_on() {
    let mut sim = simulation(&wide_config(true), 400);
    sim.request(&request(GO_BUSY, &[]));

    // tensix off: 3 flags valid, only max_ai_clk set
    sim.request(&request(0x21 | (3 << 8) | (0b001 << 16), &[]));
    assert!(!sim.board().tensix_enabled());

    sim.board_power_limit(&150u16.to_le_bytes()).unwrap();
    sim.run(2);
    assert_eq!(sim.telemetry().throttle_counter, 1);
    assert_eq!(sim.board().read_tile(KERNEL_THROTTLE_ADDRESS), None);

    // tensix back on with max_ai_clk still set
    sim.request(&request(0x21 | (3 << 8) | (0b101 << 16), &[]));
    assert_eq!(sim.board().read_tile(KERNEL_THROTTLE_ADDRESS), Some(1));
}
