use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::scenario::{Scenario, ScenarioCtx};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_key: String,
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
}

pub struct ScenarioRunner {
    verbose: bool,
}

impl ScenarioRunner {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run `scenario` once per seed, `iterations` times each. Iteration `i`
    /// of seed `s` runs with seed `s + i`.
    pub async fn run_scenario(
        &self,
        key: &str,
        scenario: &(dyn Scenario + Send + Sync),
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(seeds.len());
        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    scenario.name().bright_white()
                );
            }
            results.push(self.run_seed(key, scenario, seed, iterations).await);
        }
        results
    }

    async fn run_seed(
        &self,
        key: &str,
        scenario: &(dyn Scenario + Send + Sync),
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut durations = Vec::new();

        for i in 0..iterations {
            let ctx = ScenarioCtx {
                seed: seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX)),
                verbose: self.verbose,
            };
            let start = Instant::now();
            match scenario.run(&ctx).await {
                Ok(()) => {
                    let duration = start.elapsed();
                    successes += 1;
                    durations.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{iterations} passed ({duration:?})",
                            i + 1
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {}): {err:#}", i + 1, ctx.seed);
                    log::warn!("{key}: {message}");
                    if self.verbose {
                        println!("  ❌ {}", message.red());
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_key: key.to_string(),
            scenario_name: scenario.name().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
