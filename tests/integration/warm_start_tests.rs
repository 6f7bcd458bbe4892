use growctl::GrowError;
use growctl::bandit::{Action, LinUcb};
use growctl::bootstrap::Bootstrap;
use growctl::config::Config;
use growctl::storage::CsvInteractionLog;
use growctl::test_utils::RootFixture;

const COMPACT_CONFIG: &str = r#"
[model]
alpha = 0.5
features = ["temp", "moisture", "green", "resistor_average"]

[reward]
primary_weight = 0.9
secondary_weight = 0.2

[log]
path = "data/interactions.csv"
"#;

const HISTORY: &str = "\
timestamp,temp,moisture,green_before,resistor_average_before,action,green_after,resistor_average_after,reward
2025-05-18T13:00:00+00:00,25,60,300,100,1,330,140,35
2025-05-18T13:10:00+00:00,25,58,330,140,3,331,139,0.7
";

fn model(config: &Config) -> LinUcb {
    LinUcb::new(Action::COUNT, config.dimension(), config.linucb()).unwrap()
}

#[test]
fn compact_layout_uses_seed_and_history() {
    let fixture = RootFixture::new();
    let config_path = fixture.write_config(COMPACT_CONFIG);
    fixture.create_file("data/interactions.csv", HISTORY);

    let config = Config::load(Some(config_path.as_path()), &fixture.root).unwrap();
    let log = CsvInteractionLog::open(config.log_path(&fixture.root), config.log_schema()).unwrap();
    let bootstrap = Bootstrap::from_config(&config, Some(&log)).unwrap();
    assert_eq!(bootstrap.len(), 6);

    let mut bandit = model(&config);
    let warm = bootstrap.apply(&mut bandit).unwrap();
    assert_eq!(warm.seed_rows, 4);
    assert_eq!(warm.history_rows, 2);
    assert_eq!(bandit.arm(Action::AddWater.index()).unwrap().pulls(), 2);
    assert_eq!(bandit.arm(Action::LightOn.index()).unwrap().pulls(), 2);
}

#[test]
fn history_replay_can_be_disabled() {
    let fixture = RootFixture::new();
    let config_path = fixture.write_config(&format!(
        "{COMPACT_CONFIG}\n[bootstrap]\nreplay_history = false\nuse_seed = false\n"
    ));
    fixture.create_file("data/interactions.csv", HISTORY);

    let config = Config::load(Some(config_path.as_path()), &fixture.root).unwrap();
    let log = CsvInteractionLog::open(config.log_path(&fixture.root), config.log_schema()).unwrap();
    assert!(Bootstrap::from_config(&config, Some(&log)).unwrap().is_empty());
}

#[test]
fn log_with_other_layout_is_refused() {
    let fixture = RootFixture::new();
    fixture.create_file("interactions.csv", HISTORY);

    let config = Config::default();
    assert!(matches!(
        CsvInteractionLog::open(config.log_path(&fixture.root), config.log_schema()),
        Err(GrowError::Log(_))
    ));
}

#[test]
fn warm_start_is_deterministic() {
    let fixture = RootFixture::new();
    let config_path = fixture.write_config(COMPACT_CONFIG);
    fixture.create_file("data/interactions.csv", HISTORY);
    let config = Config::load(Some(config_path.as_path()), &fixture.root).unwrap();
    let log = CsvInteractionLog::open(config.log_path(&fixture.root), config.log_schema()).unwrap();

    let mut first = model(&config);
    let mut second = model(&config);
    Bootstrap::from_config(&config, Some(&log))
        .unwrap()
        .apply(&mut first)
        .unwrap();
    Bootstrap::from_config(&config, Some(&log))
        .unwrap()
        .apply(&mut second)
        .unwrap();
    assert_eq!(first.arms(), second.arms());
}
