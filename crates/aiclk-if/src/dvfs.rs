// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! The DVFS control loop.
//!
//! [`Dvfs::tick`] is run once per [`DVFS_INTERVAL`]. Each tick runs the throttlers (or the
//! doppler governor), resolves the AICLK target, asks the voltage subsystem for the voltage
//! that target needs and then applies both to hardware. Frequency decreases are applied
//! before the voltage change and increases after it, so AICLK never runs faster than the
//! supplied voltage allows.
//!
//! Host commands and board controller messages arrive through the `handle_*`/`on_*` methods
//! and only change state; their effect shows up on the next tick.

use std::time::Duration;

use aiclk_core::{ArbMax, ArbMin, ClockControlMode, VoltageRequester};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aiclk::{AiclkPpm, LimitReason};
use crate::config::BoardConfig;
use crate::doppler::{Doppler, DopplerFeatures};
use crate::error::{CommandError, PlatformError, STATUS_OK};
use crate::interface::{max_freq_for_voltage, ClockDomain, Platform, TelemetrySnapshot};
use crate::msg::{
    decode_board_power_limit, AiclkMsg, PowerFlag, PowerSetting, Request, Response,
    POWER_SETTINGS_SUPPORTED, RESPONSE_MSG_LEN,
};
use crate::notifier::{KernelThrottleNotifier, TensixStateMsg};
use crate::schedule::DvfsSchedule;
use crate::throttler::{ThrottlerBank, ThrottlerId, DEFAULT_BOARD_POWER_LIMIT};

/// The throttler gains and [`crate::throttler::THROTTLER_AICLK_SCALE_FACTOR`] are tuned for
/// this period. Changing it retunes every PD loop.
pub const DVFS_INTERVAL: Duration = Duration::from_millis(1);

/// Oldest telemetry a tick will act on.
pub const TELEMETRY_MAX_STALENESS: Duration = Duration::from_millis(1);

/// What one control tick did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub targ_freq: u32,
    pub curr_freq: u32,
    pub reason: LimitReason,
    pub voltage: f32,
    pub voltage_applied: bool,
    pub telemetry: TelemetrySnapshot,
}

/// State a host or telemetry publisher can query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DvfsTelemetry {
    pub aiclk: u32,
    pub targ_aiclk: u32,
    pub fmin: u32,
    pub fmax: u32,
    pub mode: ClockControlMode,
    pub limit_reason: LimitReason,
    pub board_power_limit: u32,
    pub doppler_active: bool,
    pub doppler_critical: bool,
    pub kernel_nops: bool,
    pub throttle_counter: u32,
    pub t2_count: u8,
    pub t3_count: u8,
    pub input_power: u16,
    pub average_power: u16,
}

pub struct Dvfs<P: Platform> {
    platform: P,
    ppm: AiclkPpm,
    throttlers: ThrottlerBank,
    doppler: Doppler,
    notifier: KernelThrottleNotifier,
    schedule: DvfsSchedule,
    enabled: bool,
    board_power_limit_cap: u16,
    last_input_power: u16,
}

impl<P: Platform> Dvfs<P> {
    /// Builds the governor from the board configuration. DVFS starts disabled; the loop only
    /// drives hardware after [`Dvfs::enable`].
    pub fn new(mut platform: P, config: &BoardConfig, now: u64) -> Result<Self, PlatformError> {
        let boot_freq = platform.get_frequency(ClockDomain::Aiclk)?;
        let limits = &config.chip_limits;

        let mut ppm = AiclkPpm::new(
            boot_freq,
            limits.asic_fmin,
            limits.asic_fmax,
            config.dvfs.sweep_seed,
        );

        let voltage_freq = max_freq_for_voltage(&platform, ppm.fmin(), ppm.fmax(), platform.vdd_max());
        ppm.arbiters.set_max(ArbMax::Voltage, voltage_freq as f32);

        let features = DopplerFeatures::from(&config.feature_enable);
        let mut throttlers = ThrottlerBank::new();

        throttlers.set_limit(ThrottlerId::Tdp, limits.tdp_limit);
        throttlers.set_limit(ThrottlerId::FastTdc, limits.tdc_fast_limit);
        throttlers.set_limit(ThrottlerId::Tdc, limits.tdc_limit);
        throttlers.set_limit(ThrottlerId::Thm, limits.thm_limit);
        throttlers.set_limit(ThrottlerId::BoardPower, DEFAULT_BOARD_POWER_LIMIT);
        throttlers.set_limit(ThrottlerId::GddrThm, limits.gddr_thm_limit);
        throttlers.set_limit(ThrottlerId::DopplerSlow, DEFAULT_BOARD_POWER_LIMIT);

        // doppler takes over from the power and current throttlers
        for id in [
            ThrottlerId::Tdp,
            ThrottlerId::FastTdc,
            ThrottlerId::Tdc,
            ThrottlerId::BoardPower,
        ] {
            throttlers.enable(id, !features.doppler);
            ppm.arbiters.enable_max(id.arb_max(), !features.doppler);
        }

        for id in [ThrottlerId::Thm, ThrottlerId::GddrThm] {
            throttlers.enable(id, true);
            ppm.arbiters.enable_max(id.arb_max(), true);
        }

        throttlers.enable(ThrottlerId::DopplerSlow, features.slow);
        ppm.arbiters.enable_max(ArbMax::DopplerSlow, features.slow);

        // enabled only while a trip is active
        ppm.arbiters.set_max(ArbMax::DopplerCritical, ppm.fmin() as f32);
        ppm.arbiters.enable_max(ArbMax::DopplerCritical, false);

        let mut notifier = KernelThrottleNotifier::default();
        notifier.init(&mut platform);

        info!(
            fmin = ppm.fmin(),
            fmax = ppm.fmax(),
            boot = boot_freq,
            voltage_limited = voltage_freq,
            doppler = features.doppler,
            "AICLK PPM initialised"
        );

        Ok(Self {
            platform,
            ppm,
            throttlers,
            doppler: Doppler::new(features),
            notifier,
            schedule: DvfsSchedule::new(DVFS_INTERVAL, config.dvfs.ticks_per_sec, now),
            enabled: false,
            board_power_limit_cap: limits.board_power_limit,
            last_input_power: 0,
        })
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn ppm(&self) -> &AiclkPpm {
        &self.ppm
    }

    pub fn ppm_mut(&mut self) -> &mut AiclkPpm {
        &mut self.ppm
    }

    pub fn throttlers(&self) -> &ThrottlerBank {
        &self.throttlers
    }

    pub fn throttlers_mut(&mut self) -> &mut ThrottlerBank {
        &mut self.throttlers
    }

    pub fn doppler(&self) -> &Doppler {
        &self.doppler
    }

    pub fn notifier(&self) -> &KernelThrottleNotifier {
        &self.notifier
    }

    pub fn schedule(&self) -> &DvfsSchedule {
        &self.schedule
    }

    /// Runs a tick if the DVFS timer has expired at `now`.
    pub fn poll(&mut self, now: u64) -> Option<TickReport> {
        if self.enabled && self.schedule.poll(now) {
            Some(self.tick())
        } else {
            None
        }
    }

    fn calculate_throttlers(&mut self) -> TelemetrySnapshot {
        let telemetry = self.platform.read_telemetry(TELEMETRY_MAX_STALENESS);
        self.last_input_power = telemetry.input_power;

        if self.doppler.is_active() {
            let outcome = self.doppler.update(
                telemetry.input_power,
                self.ppm.targ_freq(),
                &mut self.throttlers,
                &mut self.ppm.arbiters,
            );

            if let Some(throttle) = outcome.kernel_nops_changed {
                self.notifier.send(throttle, &mut self.platform);
            }
        } else {
            self.throttlers
                .update(ThrottlerId::Tdp, telemetry.vcore_power);
            self.throttlers
                .update(ThrottlerId::FastTdc, telemetry.vcore_current);
            self.throttlers
                .update(ThrottlerId::Tdc, telemetry.vcore_current);
            self.throttlers
                .update(ThrottlerId::BoardPower, telemetry.input_power as f32);
        }

        self.throttlers
            .update(ThrottlerId::Thm, telemetry.asic_temperature);
        self.throttlers
            .update(ThrottlerId::GddrThm, telemetry.gddr_temperature);

        self.throttlers.update_arbs(&mut self.ppm.arbiters);

        telemetry
    }

    /// Returns false if the clock driver refused the change.
    fn set_aiclk(&mut self, targ: u32) -> bool {
        match self.platform.set_frequency(ClockDomain::Aiclk, targ) {
            Ok(()) => {
                debug!(from = self.ppm.curr_freq, to = targ, "AICLK changed");
                self.ppm.curr_freq = targ;
                true
            }
            Err(err) => {
                warn!("AICLK change to {targ} MHz deferred: {err}");
                false
            }
        }
    }

    /// One pass of the control loop.
    pub fn tick(&mut self) -> TickReport {
        let telemetry = self.calculate_throttlers();
        let targ = self.ppm.calculate_targ();

        let aiclk_voltage = self.platform.voltage_for(targ as f32);
        self.platform
            .request_voltage(VoltageRequester::Aiclk, aiclk_voltage);
        let mut voltage = self.platform.resolve_target_voltage();

        if targ < self.ppm.curr_freq && !self.set_aiclk(targ) {
            // still running at the old frequency, so keep the voltage it needs
            let held = self.platform.voltage_for(self.ppm.curr_freq as f32);
            self.platform.request_voltage(VoltageRequester::Aiclk, held);
            voltage = self.platform.resolve_target_voltage();
        }

        let voltage_applied = match self.platform.apply_voltage(voltage) {
            Ok(()) => true,
            Err(err) => {
                warn!("voltage change to {voltage} mV deferred: {err}");
                false
            }
        };

        // raising AICLK is only safe once the voltage for it is in place
        if voltage_applied && targ > self.ppm.curr_freq {
            self.set_aiclk(targ);
        }

        TickReport {
            targ_freq: targ,
            curr_freq: self.ppm.curr_freq,
            reason: self.ppm.limit_reason(),
            voltage,
            voltage_applied,
            telemetry,
        }
    }

    pub fn clock_control_mode(&self) -> ClockControlMode {
        if !self.enabled {
            ClockControlMode::Uncontrolled
        } else if self.ppm.forced_freq().is_some() {
            ClockControlMode::PpmForced
        } else {
            ClockControlMode::PpmUnforced
        }
    }

    /// Forces AICLK, or releases the force with `0`.
    ///
    /// Without DVFS the clock is written directly and `0` restores the boot frequency.
    pub fn force_aiclk(&mut self, freq: u32) -> Result<(), CommandError> {
        if !self.enabled {
            let (fmin, fmax) = (self.ppm.fmin(), self.ppm.fmax());
            if freq != 0 && (freq < fmin || freq > fmax) {
                return Err(CommandError::ForcedFreqOutOfRange { freq, fmin, fmax });
            }

            let freq = if freq == 0 { self.ppm.boot_freq() } else { freq };
            self.set_aiclk(freq);
            return Ok(());
        }

        self.ppm.set_forced_freq(freq)
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.ppm.set_busy(busy);
    }

    pub fn enable_arb_max(&mut self, arb: ArbMax, enable: bool) {
        self.ppm.arbiters.enable_max(arb, enable);
    }

    pub fn enable_arb_min(&mut self, arb: ArbMin, enable: bool) {
        self.ppm.arbiters.enable_min(arb, enable);
    }

    fn apply_power_settings(&mut self, setting: &PowerSetting) -> Result<(), PlatformError> {
        let mut ret = Ok(());

        if let Some(busy) = setting.flag(PowerFlag::MaxAiClk) {
            self.set_busy(busy);
        }

        if let Some(wakeup) = setting.flag(PowerFlag::MriscPhyPower) {
            if let Err(err) = self.platform.set_mrisc_phy_power(wakeup) {
                ret = Err(err);
            }
        }

        if let Some(enable) = setting.flag(PowerFlag::TensixEnable) {
            match self.platform.set_tensix_enable(enable) {
                Ok(()) => self.on_tensix_state(TensixStateMsg { enable }),
                Err(err) => ret = Err(err),
            }
        }

        ret
    }

    /// Handles one decoded host command and fills in the response words.
    pub fn handle_msg(&mut self, msg: &AiclkMsg) -> Result<Response, CommandError> {
        let mut response = [0; RESPONSE_MSG_LEN];

        match *msg {
            AiclkMsg::AiclkGoBusy => self.set_busy(true),
            AiclkMsg::AiclkGoLongIdle => self.set_busy(false),
            AiclkMsg::ForceAiclk { freq } => self.force_aiclk(freq)?,
            AiclkMsg::GetAiclk => {
                response[1] = self.ppm.curr_freq();
                response[2] = self.clock_control_mode().into();
            }
            AiclkMsg::AisweepStart { low, high } => self.ppm.start_sweep(low, high)?,
            AiclkMsg::AisweepStop => self.ppm.stop_sweep(),
            AiclkMsg::PowerSetting(setting) => {
                if let Err(err) = self.apply_power_settings(&setting) {
                    warn!("power setting partially applied: {err}");
                }

                if setting.flags_valid > PowerFlag::COUNT {
                    warn!(
                        "Host request to apply {} power flags. FW supports only {}",
                        setting.flags_valid,
                        PowerFlag::COUNT
                    );
                }
                if setting.settings_valid > POWER_SETTINGS_SUPPORTED {
                    warn!(
                        "Host request to apply {} power settings. FW supports only {}",
                        setting.settings_valid, POWER_SETTINGS_SUPPORTED
                    );
                }

                info!(
                    busy = self.ppm.is_busy(),
                    tensix = self.notifier.tensix_enabled(),
                    "power settings applied"
                );
            }
        }

        Ok(response)
    }

    /// Decodes and handles a raw request, returning the host status byte.
    pub fn handle_request(&mut self, request: &Request) -> (u8, Response) {
        let result = AiclkMsg::from_request(request).and_then(|msg| self.handle_msg(&msg));

        match result {
            Ok(response) => (STATUS_OK, response),
            Err(err) => {
                warn!("rejected request 0x{:02x}: {err}", request[0] & 0xFF);
                (err.status(), [0; RESPONSE_MSG_LEN])
            }
        }
    }

    /// Board controller reported a new cable power limit. `0` disables doppler.
    pub fn on_board_power_limit(&mut self, limit: u16, now: u64) {
        info!("Cable Power Limit: {limit}");
        let limit = limit.min(self.board_power_limit_cap);

        self.doppler.set_power_limit(limit as u32);
        self.throttlers
            .set_limit(ThrottlerId::BoardPower, limit as f32);
        self.throttlers
            .set_limit(ThrottlerId::DopplerSlow, limit as f32);

        if self.enabled {
            self.schedule.adjust(now);
        }
    }

    pub fn on_board_power_limit_msg(&mut self, data: &[u8], now: u64) -> Result<(), CommandError> {
        let limit = decode_board_power_limit(data)?;
        self.on_board_power_limit(limit, now);
        Ok(())
    }

    /// Tensix power domain listener.
    pub fn on_tensix_state(&mut self, msg: TensixStateMsg) {
        self.notifier.on_tensix_state(msg, &mut self.platform);
    }

    pub fn telemetry(&self) -> DvfsTelemetry {
        DvfsTelemetry {
            aiclk: self.ppm.curr_freq(),
            targ_aiclk: self.ppm.targ_freq(),
            fmin: self.ppm.fmin(),
            fmax: self.ppm.fmax(),
            mode: self.clock_control_mode(),
            limit_reason: self.ppm.limit_reason(),
            board_power_limit: self.doppler.power_limit(),
            doppler_active: self.doppler.is_active(),
            doppler_critical: self.doppler.is_critical(),
            kernel_nops: self.doppler.kernel_nops_enabled(),
            throttle_counter: self.notifier.counter(),
            t2_count: self.doppler.t2_count(),
            t3_count: self.doppler.t3_count(),
            input_power: self.last_input_power,
            average_power: self.doppler.average_power(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureEnable;
    use crate::interface::{ClockDriver, TelemetrySource, TensixArray, VfCurve, VoltageRegulator};
    use crate::msg::{PowerFlags, REQUEST_MSG_LEN};
    use crate::notifier::KERNEL_THROTTLE_ADDRESS;

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Clock(u32),
        Voltage(f32),
        Broadcast(u32),
        Tensix(bool),
        Mrisc(bool),
    }

    #[derive(Default)]
    struct Board {
        aiclk: u32,
        requests: [f32; VoltageRequester::COUNT],
        telemetry: TelemetrySnapshot,
        vdd_max: f32,
        clock_busy: bool,
        voltage_busy: bool,
        ops: Vec<Op>,
    }

    impl ClockDriver for Board {
        fn get_frequency(&self, _domain: ClockDomain) -> Result<u32, PlatformError> {
            Ok(self.aiclk)
        }

        fn set_frequency(&mut self, domain: ClockDomain, mhz: u32) -> Result<(), PlatformError> {
            if self.clock_busy {
                return Err(PlatformError::ClockBusy {
                    domain: domain.name(),
                });
            }
            self.aiclk = mhz;
            self.ops.push(Op::Clock(mhz));
            Ok(())
        }
    }

    impl VoltageRegulator for Board {
        fn request_voltage(&mut self, requester: VoltageRequester, millivolts: f32) {
            self.requests[requester.index()] = millivolts;
        }

        fn resolve_target_voltage(&mut self) -> f32 {
            self.requests.iter().copied().fold(0.0, f32::max)
        }

        fn apply_voltage(&mut self, millivolts: f32) -> Result<(), PlatformError> {
            if self.voltage_busy {
                return Err(PlatformError::VoltageBusy { millivolts });
            }
            self.ops.push(Op::Voltage(millivolts));
            Ok(())
        }

        fn vdd_max(&self) -> f32 {
            self.vdd_max
        }
    }

    impl VfCurve for Board {
        fn voltage_for(&self, mhz: f32) -> f32 {
            500.0 + mhz / 4.0
        }
    }

    impl TelemetrySource for Board {
        fn read_telemetry(&mut self, _max_staleness: Duration) -> TelemetrySnapshot {
            self.telemetry
        }
    }

    impl TensixArray for Board {
        fn broadcast_write32(&mut self, addr: u64, value: u32) -> Result<(), PlatformError> {
            if addr != KERNEL_THROTTLE_ADDRESS {
                return Err(PlatformError::Broadcast { addr });
            }
            self.ops.push(Op::Broadcast(value));
            Ok(())
        }

        fn set_tensix_enable(&mut self, enable: bool) -> Result<(), PlatformError> {
            self.ops.push(Op::Tensix(enable));
            Ok(())
        }

        fn set_mrisc_phy_power(&mut self, wakeup: bool) -> Result<(), PlatformError> {
            self.ops.push(Op::Mrisc(wakeup));
            Ok(())
        }
    }

    fn config(doppler: bool) -> BoardConfig {
        let mut config = BoardConfig::default();
        config.chip_limits.asic_fmin = 200.0;
        config.chip_limits.asic_fmax = 1400.0;
        config.feature_enable = FeatureEnable {
            doppler_en: doppler,
            ..Default::default()
        };
        config
    }

    fn dvfs(doppler: bool) -> Dvfs<Board> {
        let board = Board {
            aiclk: 800,
            vdd_max: 850.0,
            ..Default::default()
        };
        let mut dvfs = Dvfs::new(board, &config(doppler), 0).unwrap();
        dvfs.platform_mut().ops.clear();
        dvfs
    }

    fn request(words: &[u32]) -> Request {
        let mut request = [0; REQUEST_MSG_LEN];
        request[..words.len()].copy_from_slice(words);
        request
    }

    #[test]
    fn init_limits_aiclk_to_vdd_max() {
        // 500 + 1400 / 4 = 850
        let dvfs = dvfs(false);
        assert_eq!(dvfs.ppm().arbiters.max(ArbMax::Voltage).value, 1400.0);
        assert!(!dvfs.ppm().arbiters.max(ArbMax::DopplerCritical).enabled);
        assert_eq!(dvfs.ppm().boot_freq(), 800);
        assert!(!dvfs.is_enabled());

        let board = Board {
            aiclk: 800,
            vdd_max: 750.0,
            ..Default::default()
        };
        let dvfs = Dvfs::new(board, &config(false), 0).unwrap();
        assert_eq!(dvfs.ppm().arbiters.max(ArbMax::Voltage).value, 1000.0);
    }

    #[test]
    fn doppler_replaces_power_throttlers() {
        let plain = dvfs(false);
        assert!(plain.throttlers().is_enabled(ThrottlerId::Tdp));
        assert!(plain.throttlers().is_enabled(ThrottlerId::BoardPower));
        assert!(!plain.throttlers().is_enabled(ThrottlerId::DopplerSlow));

        let doppler = dvfs(true);
        for id in [
            ThrottlerId::Tdp,
            ThrottlerId::FastTdc,
            ThrottlerId::Tdc,
            ThrottlerId::BoardPower,
        ] {
            assert!(!doppler.throttlers().is_enabled(id), "{id:?}");
            assert!(!doppler.ppm().arbiters.max(id.arb_max()).enabled, "{id:?}");
        }
        assert!(doppler.throttlers().is_enabled(ThrottlerId::Thm));
        assert!(doppler.throttlers().is_enabled(ThrottlerId::DopplerSlow));
    }

    #[test]
    fn increase_waits_for_voltage() {
        let mut dvfs = dvfs(false);
        dvfs.enable();
        dvfs.set_busy(true);

        let report = dvfs.tick();
        assert_eq!(report.targ_freq, 1400);
        assert_eq!(
            dvfs.platform().ops,
            vec![Op::Voltage(850.0), Op::Clock(1400)]
        );
    }

    #[test]
    fn decrease_precedes_voltage() {
        let mut dvfs = dvfs(false);
        dvfs.enable();
        dvfs.set_busy(true);
        dvfs.tick();
        dvfs.platform_mut().ops.clear();

        dvfs.set_busy(false);
        let report = dvfs.tick();
        assert_eq!(report.curr_freq, 200);
        assert_eq!(dvfs.platform().ops, vec![Op::Clock(200), Op::Voltage(550.0)]);
    }

    #[test]
    fn failed_voltage_skips_increase() {
        let mut dvfs = dvfs(false);
        dvfs.enable();
        dvfs.set_busy(true);
        dvfs.platform_mut().voltage_busy = true;

        let report = dvfs.tick();
        assert!(!report.voltage_applied);
        assert_eq!(report.curr_freq, 800);
        assert!(dvfs.platform().ops.is_empty());

        dvfs.platform_mut().voltage_busy = false;
        assert_eq!(dvfs.tick().curr_freq, 1400);
    }

    #[test]
    fn failed_decrease_holds_voltage() {
        let mut dvfs = dvfs(false);
        dvfs.enable();
        dvfs.set_busy(true);
        dvfs.tick();
        dvfs.platform_mut().ops.clear();

        dvfs.platform_mut().clock_busy = true;
        dvfs.set_busy(false);
        let report = dvfs.tick();
        assert_eq!(report.targ_freq, 200);
        assert_eq!(report.curr_freq, 1400);
        assert_eq!(report.voltage, 850.0);
        assert_eq!(dvfs.platform().ops, vec![Op::Voltage(850.0)]);
        dvfs.platform_mut().ops.clear();

        dvfs.platform_mut().clock_busy = false;
        assert_eq!(dvfs.tick().curr_freq, 200);
        assert_eq!(dvfs.platform().ops, vec![Op::Clock(200), Op::Voltage(550.0)]);
    }

    #[test]
    fn disabled_arbiter_ignores_running_throttler() {
        let mut dvfs = dvfs(false);
        dvfs.enable();
        dvfs.set_busy(true);
        // 10 °C over the thermal limit
        dvfs.platform_mut().telemetry.asic_temperature = 100.0;
        dvfs.enable_arb_max(ArbMax::Thm, false);

        for _ in 0..5 {
            assert_eq!(dvfs.tick().curr_freq, 1400);
        }
        assert!(dvfs.throttlers().is_enabled(ThrottlerId::Thm));
        assert_eq!(dvfs.throttlers().get(ThrottlerId::Thm).value, 100.0);
        let thm = dvfs.ppm().arbiters.max(ArbMax::Thm);
        assert!(!thm.enabled);
        assert!(thm.value < 1400.0);

        dvfs.enable_arb_max(ArbMax::Thm, true);
        let report = dvfs.tick();
        assert!(report.targ_freq < 1400);
        assert_eq!(report.reason, LimitReason::ArbMax(ArbMax::Thm));
    }

    #[test]
    fn disabled_busy_floor_is_ignored() {
        let mut dvfs = dvfs(false);
        dvfs.enable();
        dvfs.set_busy(true);
        dvfs.enable_arb_min(ArbMin::Busy, false);

        let report = dvfs.tick();
        assert_eq!(report.curr_freq, 200);
        assert_eq!(report.reason, LimitReason::ArbMin(ArbMin::Fmin));

        dvfs.enable_arb_min(ArbMin::Busy, true);
        assert_eq!(dvfs.tick().curr_freq, 1400);
    }

    #[test]
    fn get_aiclk_reports_mode() {
        let mut dvfs = dvfs(false);

        let (status, response) = dvfs.handle_request(&request(&[0x34]));
        assert_eq!(status, STATUS_OK);
        assert_eq!(response[1], 800);
        assert_eq!(response[2], ClockControlMode::Uncontrolled as u32);

        dvfs.enable();
        dvfs.handle_request(&request(&[0x33, 1000]));
        let (_, response) = dvfs.handle_request(&request(&[0x34]));
        assert_eq!(response[2], ClockControlMode::PpmForced as u32);

        dvfs.handle_request(&request(&[0x33, 0]));
        let (_, response) = dvfs.handle_request(&request(&[0x34]));
        assert_eq!(response[2], ClockControlMode::PpmUnforced as u32);
    }

    #[test]
    fn force_without_dvfs_writes_clock() {
        let mut dvfs = dvfs(false);

        assert_eq!(dvfs.handle_request(&request(&[0x33, 1100])).0, STATUS_OK);
        assert_eq!(dvfs.platform().aiclk, 1100);

        dvfs.handle_request(&request(&[0x33, 0]));
        assert_eq!(dvfs.platform().aiclk, 800);

        let (status, _) = dvfs.handle_request(&request(&[0x33, 1500]));
        assert_eq!(status, crate::error::STATUS_ERR);
        assert_eq!(dvfs.platform().aiclk, 800);
    }

    #[test]
    fn rejected_force_keeps_state() {
        let mut dvfs = dvfs(false);
        dvfs.enable();

        let (status, _) = dvfs.handle_request(&request(&[0x33, 100]));
        assert_eq!(status, crate::error::STATUS_ERR);
        assert_eq!(dvfs.ppm().forced_freq(), None);
        assert_eq!(dvfs.handle_request(&request(&[0x7f])).0, crate::error::STATUS_ERR);
    }

    #[test]
    fn power_setting_toggles_tensix() {
        let mut dvfs = dvfs(false);
        let setting = PowerSetting {
            flags_valid: 3,
            settings_valid: 0,
            flags: PowerFlags::new()
                .with_max_ai_clk(true)
                .with_mrisc_phy_power(true)
                .with_tensix_enable(false),
        };

        let (status, _) = dvfs.handle_request(&AiclkMsg::PowerSetting(setting).to_request());
        assert_eq!(status, STATUS_OK);
        assert!(dvfs.ppm().is_busy());
        assert!(!dvfs.notifier().tensix_enabled());
        assert_eq!(dvfs.platform().ops, vec![Op::Mrisc(true), Op::Tensix(false)]);

        // re-enabling replays the throttle counter to the new tiles
        dvfs.platform_mut().ops.clear();
        let setting = PowerSetting {
            flags_valid: 3,
            settings_valid: 0,
            flags: PowerFlags::new().with_tensix_enable(true),
        };
        dvfs.handle_request(&AiclkMsg::PowerSetting(setting).to_request());
        assert!(!dvfs.ppm().is_busy());
        assert_eq!(
            dvfs.platform().ops,
            vec![Op::Mrisc(false), Op::Tensix(true), Op::Broadcast(0)]
        );
    }

    #[test]
    fn board_power_limit_is_capped() {
        let mut dvfs = dvfs(true);
        dvfs.enable();

        dvfs.on_board_power_limit_msg(&[0x96, 0x00], 200).unwrap();
        assert_eq!(dvfs.doppler().power_limit(), 150);
        // 800 ticks from the deadline: pulled in by 1%
        assert_eq!(dvfs.schedule().next_deadline(), 990);

        dvfs.on_board_power_limit(1000, 300);
        assert_eq!(dvfs.doppler().power_limit(), 600);
        assert_eq!(dvfs.throttlers().get(ThrottlerId::BoardPower).limit, 600.0);

        assert!(dvfs.on_board_power_limit_msg(&[1, 2, 3], 400).is_err());
        assert_eq!(dvfs.doppler().power_limit(), 600);
    }

    #[test]
    fn poll_only_runs_when_enabled() {
        let mut dvfs = dvfs(false);
        assert!(dvfs.poll(1000).is_none());

        dvfs.enable();
        assert!(dvfs.poll(999).is_none());
        assert!(dvfs.poll(1000).is_some());
        assert!(dvfs.poll(1500).is_none());
    }
}
