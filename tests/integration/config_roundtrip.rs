//! Config file persistence and validation.

use chrono::Weekday;
use goal_bot::BotConfig;
use goal_bot::scheduler::{TimeOfDay, Trigger};
use goal_bot::{BotError, Period};

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("nested").join("config.toml");

    let mut config = BotConfig::default();
    config.telegram.bot_token = "123:abc".to_owned();
    config.sheets.spreadsheet_id = "sheet-1".to_owned();
    config.admin.operator_id = Some("99".to_owned());
    config.schedule.weekly = Trigger::Weekly {
        weekday: Weekday::Fri,
        time: TimeOfDay::new(17, 0),
    };
    config.save_to_file(&path).unwrap();

    let loaded = BotConfig::from_file(&path).unwrap();
    assert_eq!(loaded.telegram.bot_token, "123:abc");
    assert_eq!(loaded.admin.operator_id.as_deref(), Some("99"));
    assert_eq!(loaded.schedule, config.schedule);
    loaded.validate().unwrap();
}

#[test]
fn partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[telegram]
bot_token = "t"

[sheets]
spreadsheet_id = "s"
sheet_name = "Goals 2024"

[layout]
block_size = 5

[schedule.monthly]
kind = "monthly"
day = 15
time = { hour = 8, min = 0 }
"#,
    )
    .unwrap();

    let config = BotConfig::from_file(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.layout.block_size, 5);
    assert_eq!(config.layout.first_row, 2);
    assert_eq!(config.schedule.utc_offset_hours, 3);
    assert_eq!(
        config.schedule.trigger(Period::Monthly),
        &Trigger::Monthly {
            day: 15,
            time: TimeOfDay::new(8, 0)
        }
    );
    assert_eq!(config.telegram.max_messages_per_minute, 20);

    let layout = config.column_layout().unwrap();
    assert_eq!(layout.block_start(2), 12);
    assert_eq!(
        layout.goal_range(2, Period::Daily).to_string(),
        "'Goals 2024'!C2:C6"
    );
}

#[test]
fn invalid_trigger_fails_validation() {
    let mut config = BotConfig::default();
    config.telegram.bot_token = "t".to_owned();
    config.sheets.spreadsheet_id = "s".to_owned();
    config.schedule.daily = Trigger::FixedDailyTimes {
        weekdays: vec![Weekday::Mon],
        times: vec![TimeOfDay::new(25, 0)],
    };
    assert!(matches!(config.validate(), Err(BotError::Config(msg)) if msg.contains("daily")));
}

#[test]
fn malformed_file_is_config_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "telegram = 3").unwrap();
    assert!(matches!(BotConfig::from_file(&path), Err(BotError::Config(_))));
}
