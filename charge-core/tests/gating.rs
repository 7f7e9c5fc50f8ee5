mod common;

use charge_core::error::{GaugeError, ProbeError};
use charge_core::hal::BootMode;
use charge_core::{
    ChargeAnimation, ChargeConfig, ChargeError, Entry, ExitReason, FrameTable, SkipReason,
};
use common::{Board, Shown, animation, charging_config};
use embassy_futures::block_on;

fn entry(board: &Board, config: ChargeConfig) -> Entry {
    let mut anim = animation(board, config);
    block_on(anim.enter()).unwrap()
}

fn skip_reason(entry: Entry) -> Option<SkipReason> {
    match entry {
        Entry::Skip(reason) => Some(reason),
        Entry::Charge(_) => None,
    }
}

#[test]
fn charges_with_charger_and_battery() {
    let board = Board::new();
    assert_eq!(skip_reason(entry(&board, charging_config())), None);
}

#[test]
fn missing_battery_skips_charging() {
    let board = Board::new();
    board.gauge.borrow_mut().battery = false;
    assert_eq!(
        skip_reason(entry(&board, charging_config())),
        Some(SkipReason::BatteryAbsent)
    );
}

#[test]
fn show_without_battery_boots_without_guard() {
    let board = Board::new();
    board.gauge.borrow_mut().battery = false;
    let mut anim = animation(&board, charging_config());

    let outcome = block_on(anim.show()).unwrap();

    assert_eq!(outcome.reason, ExitReason::BootAllowed);
    assert_eq!(outcome.summary, None);
    assert_eq!(board.gauge.borrow().voltage_reads, 0);
}

#[test]
fn preboot_command_skips_charging() {
    let mut board = Board::new();
    board.preboot = Some("run recovery".into());
    assert_eq!(
        skip_reason(entry(&board, charging_config())),
        Some(SkipReason::Preboot)
    );
}

#[test]
fn dvfs_preboot_command_still_charges() {
    let mut board = Board::new();
    board.preboot = Some("dvfs repeat".into());
    assert_eq!(skip_reason(entry(&board, charging_config())), None);
}

#[test]
fn other_boot_modes_are_ignored_by_default() {
    for mode in [BootMode::Normal, BootMode::Recovery, BootMode::Other(7)] {
        let mut board = Board::new();
        board.boot_mode = mode;
        assert_eq!(skip_reason(entry(&board, charging_config())), None);
    }
}

#[test]
fn other_boot_modes_rejected_when_configured() {
    let config = ChargeConfig {
        reject_on_unknown_boot_mode: true,
        ..charging_config()
    };

    let mut board = Board::new();
    board.boot_mode = BootMode::Normal;
    assert_eq!(skip_reason(entry(&board, config)), Some(SkipReason::BootMode));

    let mut board = Board::new();
    board.boot_mode = BootMode::Undefined;
    assert_eq!(skip_reason(entry(&board, config)), None);
}

#[test]
fn charger_offline_skips_charging() {
    let board = Board::new();
    board.gauge.borrow_mut().charger_online = false;
    assert_eq!(
        skip_reason(entry(&board, charging_config())),
        Some(SkipReason::ChargerOffline)
    );
    assert_eq!(board.shutdowns.get(), 0);
}

#[test]
fn disabled_uboot_charge_skips_charging() {
    let board = Board::new();
    let config = ChargeConfig {
        uboot_charge: false,
        ..charging_config()
    };
    assert_eq!(
        skip_reason(entry(&board, config)),
        Some(SkipReason::ChargeDisabled)
    );
}

#[test]
fn android_charge_tags_boot_even_when_skipped() {
    let board = Board::new();
    board.gauge.borrow_mut().battery = false;
    let config = ChargeConfig {
        android_charge: true,
        ..charging_config()
    };

    assert_eq!(
        skip_reason(entry(&board, config)),
        Some(SkipReason::BatteryAbsent)
    );
    assert!(board.tagged.get());
}

#[test]
fn voltage_read_failure_aborts_entry() {
    let board = Board::new();
    board.gauge.borrow_mut().voltage_error = Some(GaugeError::Bus);
    let mut anim = animation(&board, charging_config());

    assert_eq!(
        block_on(anim.enter()).err(),
        Some(ChargeError::Telemetry(GaugeError::Bus))
    );
}

#[test]
fn low_voltage_starts_with_screen_off() {
    let board = Board::new();
    board.set_voltage(3450);
    let Entry::Charge(state) = entry(&board, charging_config()) else {
        panic!("charging skipped");
    };

    assert!(!state.screen_on);
    assert!(state.ever_low_power_screen_off);
    assert_eq!(
        *board.shown.borrow(),
        [Shown::Blank, Shown::Screen(false)]
    );
}

#[test]
fn voltage_above_screen_floor_starts_with_screen_on() {
    let board = Board::new();
    board.set_voltage(3451);
    let Entry::Charge(state) = entry(&board, charging_config()) else {
        panic!("charging skipped");
    };

    assert!(state.screen_on);
    assert!(!state.ever_low_power_screen_off);
    assert!(board.shown.borrow().is_empty());
}

#[test]
fn probe_requires_power_key() {
    let mut board = Board::new();
    board.key_present = false;
    let result = block_on(ChargeAnimation::probe(
        charging_config(),
        FrameTable::default(),
        board.context(),
    ));
    assert_eq!(result.err(), Some(ChargeError::Probe(ProbeError::PowerKey)));
}

#[test]
fn probe_requires_pmic() {
    let mut board = Board::new();
    board.pmic_present = false;
    let result = block_on(ChargeAnimation::probe(
        charging_config(),
        FrameTable::default(),
        board.context(),
    ));
    assert_eq!(result.err(), Some(ChargeError::Probe(ProbeError::Pmic)));
}

#[test]
fn probe_rejects_bogus_fuel_gauge() {
    let board = Board::new();
    board.set_soc(-3);
    let result = block_on(ChargeAnimation::probe(
        charging_config(),
        FrameTable::default(),
        board.context(),
    ));
    assert_eq!(result.err(), Some(ChargeError::Probe(ProbeError::FuelGauge)));
}

#[test]
fn probe_clamps_screen_on_voltage() {
    let board = Board::new();
    let config = ChargeConfig {
        screen_on_voltage_mv: 3700,
        ..charging_config()
    };
    let anim = animation(&board, config);
    assert_eq!(anim.config().screen_on_voltage_mv, 3600);
}

#[test]
fn show_runs_charge_loop_above_low_power_floor() {
    let mut board = Board::new();
    board.cancel_after = Some(2);
    let mut anim = animation(&board, charging_config());

    let outcome = block_on(anim.show()).unwrap();

    assert_eq!(outcome.reason, ExitReason::Cancelled);
    assert!(outcome.summary.is_some());
    assert!(board.suspend.borrow().armed.is_empty());
}
