use packet_thermostat_common::{
    ActiveModeRegistry, ArbitrationPolicy, Command, CommandError, ControllerConfig, Eeprom,
    MemoryEeprom, ModeType, OutputAction, RecordLayout, SettingsStore, Thermostat,
};
use pretty_assertions::assert_eq;

const SENSOR: u8 = 1;

fn boot(eeprom: MemoryEeprom) -> (Thermostat<MemoryEeprom>, Vec<OutputAction>) {
    Thermostat::boot(ControllerConfig::default(), eeprom, 0).unwrap()
}

fn fresh() -> Thermostat<MemoryEeprom> {
    boot(MemoryEeprom::new(1_024)).0
}

fn send(thermostat: &mut Thermostat<MemoryEeprom>, commands: &[&str], now_ms: u64) {
    for command in commands {
        thermostat
            .handle_command(command, now_ms)
            .unwrap_or_else(|err| panic!("{command}: {err}"));
    }
}

fn report(
    thermostat: &mut Thermostat<MemoryEeprom>,
    text: &str,
    now_ms: u64,
) -> Result<Vec<OutputAction>, CommandError> {
    thermostat.handle_sensor_report(SENSOR, text, now_ms)
}

fn cool_mode(thermostat: &mut Thermostat<MemoryEeprom>) {
    send(
        thermostat,
        &[
            "HVAC TYPE=3 COUNT=1",
            "HVAC TYPE=3 MODE=0",
            "HVAC_SETTINGS 400 410 02 10 01 20 22 26 600 1200",
        ],
        0,
    );
}

#[test]
fn heat_activate_defaults_below_target() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=2 COUNT=1",
            "HVAC TYPE=2 MODE=0",
            "HVAC_SETTINGS 200 194 02 10 01 20 22 26 600 1200",
            "HVAC_SETTINGS 370",
        ],
        0,
    );

    assert_eq!(report(&mut thermostat, "T:+36.50", 1_000), Ok(vec![OutputAction::Update(0x01)]));
    assert_eq!(report(&mut thermostat, "T:+36.40", 2_000), Ok(vec![OutputAction::Update(0x20)]));
    assert_eq!(thermostat.status().target_cx10, Some(370));
}

#[test]
fn cool_stages_up_over_time_and_drops_out() {
    let mut thermostat = fresh();
    cool_mode(&mut thermostat);

    assert_eq!(report(&mut thermostat, "T:+41.10", 0), Ok(vec![OutputAction::Update(0x20)]));
    assert_eq!(thermostat.status().stage, Some("STAGE1"));

    assert_eq!(
        report(&mut thermostat, "T:+41.10", 600_000),
        Ok(vec![OutputAction::Update(0x22)])
    );
    assert_eq!(thermostat.status().stage, Some("STAGE2"));

    assert_eq!(
        report(&mut thermostat, "T:+41.10", 1_200_000),
        Ok(vec![OutputAction::Update(0x26)])
    );
    assert_eq!(thermostat.status().stage, Some("STAGE3"));

    assert_eq!(
        report(&mut thermostat, "T:+39.90", 1_210_000),
        Ok(vec![OutputAction::Update(0x01)])
    );
    assert_eq!(thermostat.status().stage, Some("OFF"));
    assert_eq!(thermostat.output_mask(), 0x01);
}

#[test]
fn tick_advances_stage_between_reports() {
    let mut thermostat = fresh();
    cool_mode(&mut thermostat);
    report(&mut thermostat, "T:+41.10", 1_000).unwrap();

    assert_eq!(thermostat.tick(300_000), vec![]);
    assert_eq!(thermostat.tick(601_000), vec![OutputAction::Update(0x22)]);
    assert_eq!(thermostat.tick(602_000), vec![]);
    assert_eq!(thermostat.tick(1_201_000), vec![OutputAction::Update(0x26)]);
}

#[test]
fn dehumidify_engages_and_releases_with_hysteresis() {
    let mut thermostat = fresh();
    cool_mode(&mut thermostat);
    send(&mut thermostat, &["HUM_SETTINGS 600 08 00"], 0);

    assert_eq!(
        report(&mut thermostat, "T:+41.10 R:62.00", 1_000),
        Ok(vec![OutputAction::Update(0x28)])
    );
    assert_eq!(thermostat.status().dehumidify, Some("ACTIVE"));

    // still inside the band
    assert_eq!(
        report(&mut thermostat, "T:+41.10 R:59.00", 2_000),
        Ok(vec![OutputAction::Update(0x28)])
    );

    assert_eq!(
        report(&mut thermostat, "T:+41.10 R:58.00", 3_000),
        Ok(vec![OutputAction::Update(0x20)])
    );
    assert_eq!(thermostat.status().dehumidify, Some("OFF"));
}

#[test]
fn silent_sensor_forces_fail_safe() {
    let mut thermostat = fresh();
    cool_mode(&mut thermostat);
    report(&mut thermostat, "T:+41.10", 1_000).unwrap();

    // twice the time to third stage, measured from the last accepted report
    assert_eq!(
        thermostat.tick(1_000 + 2_400_001),
        vec![OutputAction::Update(0x01)]
    );

    let status = thermostat.status();
    assert_eq!(status.stage, Some("OFF"));
    assert_eq!(status.actual_cx10, None);
    assert_eq!(status.outputs, 0x01);
    assert_eq!(thermostat.tick(1_000 + 2_500_000), vec![]);
}

#[test]
fn lower_sensor_id_holds_priority_inside_window() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=2 COUNT=1",
            "HVAC TYPE=2 MODE=0",
            "HVAC_SETTINGS 200 194 06 10 01 20 22 26 600 1200",
        ],
        0,
    );

    thermostat.handle_sensor_report(1, "T:+18.00", 1_000).unwrap();
    assert_eq!(thermostat.handle_sensor_report(2, "T:+25.00", 2_000), Ok(vec![]));
    assert_eq!(thermostat.status().actual_cx10, Some(180));

    assert_eq!(
        thermostat.handle_sensor_report(2, "T:+25.00", 1_000 + 15 * 60 * 1_000),
        Ok(vec![OutputAction::Update(0x01)])
    );
    assert_eq!(
        thermostat.handle_sensor_report(3, "T:+25.00", 1_000),
        Err(CommandError::SensorNotAccepted(3))
    );
}

#[test]
fn input_map_write_past_table_keeps_earlier_entries() {
    let mut thermostat = fresh();
    send(&mut thermostat, &["HVAC TYPE=1 COUNT=1", "HVAC TYPE=1 MODE=0"], 0);

    assert_eq!(
        thermostat.handle_command("HVACMAP=0x3E AA BB CC", 0),
        Err(CommandError::MapIndexOutOfRange(64))
    );
    assert_eq!(thermostat.inputs_changed(0x7C), vec![OutputAction::Update(0xAA)]);
    assert_eq!(thermostat.inputs_changed(0x7E), vec![OutputAction::Update(0xBB)]);

    send(&mut thermostat, &["HVACMAP=0x3E 11 22"], 0);
    assert_eq!(thermostat.inputs_changed(0x7C), vec![OutputAction::Update(0x11)]);
    // unmapped entries pass the inputs through
    assert_eq!(thermostat.inputs_changed(0x0B), vec![OutputAction::Update(0x0B)]);
}

#[test]
fn switch_uses_new_mode_settings_before_commit() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=2 COUNT=1",
            "HVAC TYPE=3 COUNT=1",
            "HVAC TYPE=3 MODE=0",
            "HVAC_SETTINGS 250 256 02 10 01 40 40 40 600 1200",
            "HVAC COMMIT",
            "HVAC TYPE=2 MODE=0",
            "HVAC_SETTINGS 200 194 02 10 01 20 22 26 600 1200",
        ],
        0,
    );

    assert_eq!(
        thermostat.handle_command("HVAC TYPE=3 MODE=0", 5_000),
        Ok(vec![OutputAction::Update(0x01)])
    );
    assert_eq!(
        report(&mut thermostat, "T:+26.00", 5_000),
        Ok(vec![OutputAction::Update(0x40)])
    );
    assert_eq!(thermostat.status().target_cx10, Some(250));
}

#[test]
fn uncommitted_changes_are_lost_on_switch() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=2 COUNT=1",
            "HVAC TYPE=3 COUNT=1",
            "HVAC TYPE=2 MODE=0",
            "HVAC NAME=WARM",
            "HVAC_SETTINGS 210",
            "HVAC TYPE=3 MODE=0",
            "HVAC TYPE=2 MODE=0",
        ],
        0,
    );

    let status = thermostat.status();
    assert_eq!(status.name, "");
    assert_eq!(status.target_cx10, Some(0));
}

#[test]
fn committed_mode_survives_reboot() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=2 COUNT=2",
            "HVAC TYPE=2 MODE=1",
            "HVAC NAME=DEN",
            "HVAC_SETTINGS 210 204 02 10 04 20 22 26 600 1200",
            "HVAC COMMIT",
        ],
        0,
    );
    let image = thermostat.store().eeprom().clone();

    let (restored, actions) = boot(image);

    assert_eq!(restored.active_mode(), (ModeType::Heat, 1));
    assert_eq!(actions, vec![OutputAction::Update(0x04)]);
    let status = restored.status();
    assert_eq!(status.name, "DEN");
    assert_eq!(status.target_cx10, Some(210));
    assert_eq!(status.outputs, 0x04);
}

#[test]
fn records_follow_each_other_without_overlap() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=1 COUNT=2",
            "HVAC TYPE=2 COUNT=1",
            "HVAC TYPE=3 COUNT=3",
            "HVAC TYPE=4 COUNT=1",
        ],
        0,
    );
    let store = thermostat.store();

    for mode_type in &ModeType::ALL[1..] {
        let previous = mode_type.previous().unwrap();
        let previous_count = store.slot_count(previous).unwrap();
        assert_eq!(
            store.slot_address(*mode_type, 0),
            store.slot_address(previous, previous_count)
        );
    }
    let end = store.slot_address(ModeType::Auto, 1).unwrap();
    assert!(end <= store.eeprom().capacity());
}

#[test]
fn count_and_mode_values_are_validated() {
    let mut thermostat = fresh();

    assert_eq!(
        thermostat.handle_command("HVAC TYPE=7 COUNT=1", 0),
        Err(CommandError::TypeOutOfRange(7))
    );
    assert_eq!(
        thermostat.handle_command("HVAC TYPE=2 COUNT=256", 0),
        Err(CommandError::CountOutOfRange(256))
    );
    assert_eq!(
        thermostat.handle_command("HVAC TYPE=2 MODE=0", 0),
        Err(CommandError::SlotOutOfRange {
            mode_type: ModeType::Heat,
            slot: 0,
            count: 0,
        })
    );
    assert_eq!(thermostat.active_mode(), (ModeType::PassThrough, 0));
}

#[test]
fn dehumidify_masks_need_a_humidity_reading() {
    let mut thermostat = fresh();
    cool_mode(&mut thermostat);
    send(&mut thermostat, &["HUM_SETTINGS 600 08 00"], 0);

    assert_eq!(
        report(&mut thermostat, "T:+40.50 R:70.00", 1_000),
        Ok(vec![OutputAction::Update(0x09)])
    );
    assert_eq!(thermostat.status().dehumidify, Some("ACTIVE"));

    assert_eq!(
        report(&mut thermostat, "T:+39.00", 2_000),
        Ok(vec![OutputAction::Update(0x01)])
    );
    assert_eq!(thermostat.output_mask(), 0x01);
}

#[test]
fn dehumidify_abandoned_below_cooling_activate() {
    let mut thermostat = fresh();
    cool_mode(&mut thermostat);
    send(&mut thermostat, &["HUM_SETTINGS 600 08 00"], 0);
    report(&mut thermostat, "T:+40.50 R:70.00", 1_000).unwrap();

    // half a degree under activate
    assert_eq!(
        report(&mut thermostat, "T:+40.40 R:70.00", 2_000),
        Ok(vec![OutputAction::Update(0x01)])
    );
    assert_eq!(thermostat.status().dehumidify, Some("OFF"));
}

#[test]
fn erased_record_keeps_live_settings() {
    let mut store = SettingsStore::new(MemoryEeprom::new(1_024), RecordLayout::new(32));
    store.set_slot_count(ModeType::Heat, 1).unwrap();
    let mut registry = ActiveModeRegistry::new(ArbitrationPolicy::default(), 0);
    registry.switch(&mut store, ModeType::Heat, 0, 0).unwrap();

    let command = Command::parse("HVAC_SETTINGS 215 209 02 10 01 20 22 26 600 1200").unwrap();
    registry.controller_mut().apply_settings(&command).unwrap();
    let before = registry.controller().settings();

    assert_eq!(registry.load_settings(&store), Ok(false));
    assert_eq!(registry.controller().settings(), before);
    assert_eq!(registry.controller().target_and_actual(), Some((215, None)));
}

#[test]
fn auto_heat_activate_defaults_below_heat_target() {
    let mut thermostat = fresh();
    send(
        &mut thermostat,
        &[
            "HVAC TYPE=4 COUNT=1",
            "HVAC TYPE=4 MODE=0",
            "HVAC_SETTINGS 240 246 02 10 01 20 22 26 600 1200",
            "AUTO_SETTINGS 150 140 08 0A 0E",
            "AUTO_SETTINGS 200",
        ],
        0,
    );

    assert_eq!(report(&mut thermostat, "T:+19.50", 1_000), Ok(vec![OutputAction::Update(0x01)]));
    assert_eq!(report(&mut thermostat, "T:+19.40", 2_000), Ok(vec![OutputAction::Update(0x08)]));
    assert_eq!(thermostat.status().heat_stage, Some("STAGE1"));
}

#[test]
fn oversized_map_index_is_rejected() {
    let mut thermostat = fresh();
    send(&mut thermostat, &["HVAC TYPE=1 COUNT=1", "HVAC TYPE=1 MODE=0"], 0);

    assert_eq!(
        thermostat.handle_command("HVACMAP=0x100000000 AA", 0),
        Err(CommandError::MapIndexOutOfRange(u32::MAX))
    );
    assert_eq!(thermostat.inputs_changed(0x01), vec![OutputAction::Update(0x01)]);
}
