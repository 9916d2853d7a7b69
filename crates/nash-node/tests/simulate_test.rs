use nash_node::config::NodeConfig;
use nash_node::simulate;
use nash_validator::Mode;

fn seeded_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.validator.challenge_seed = Some(11);
    config.validator.estimator.seed = Some(12);
    config.miner.seed = Some(13);
    config.miner.inference_budget_ms = 10_000;
    config
}

#[tokio::test]
async fn test_simulated_rounds_publish_normalised_weights() {
    let summaries = simulate::run(&seeded_config(), 4, 3).await.unwrap();

    assert_eq!(summaries.len(), 3);
    for summary in &summaries {
        assert!(summary.published);
        assert_eq!(summary.valid, 4);
        assert_eq!(summary.weights.len(), 4);
        let sum: f64 = summary.weights.iter().sum();
        assert!(sum == 0.0 || (sum - 1.0).abs() < 1e-6, "sum {}", sum);
        assert!(summary.weights.iter().all(|w| (0.0..=1.0).contains(w)));
    }
}

#[tokio::test]
async fn test_zero_workers_aborts_every_round() {
    let summaries = simulate::run(&seeded_config(), 0, 2).await.unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| !s.published && s.weights.is_empty()));
}

#[tokio::test]
async fn test_simulation_switches_to_production_after_target() {
    let mut config = seeded_config();
    config.validator.training_sample_target = 2;

    let summaries = simulate::run(&config, 3, 4).await.unwrap();

    let modes: Vec<Mode> = summaries.iter().map(|s| s.mode).collect();
    assert_eq!(
        modes,
        vec![Mode::Training, Mode::Training, Mode::Production, Mode::Production]
    );
    assert!(summaries.iter().all(|s| s.published && s.valid == 3));
}
