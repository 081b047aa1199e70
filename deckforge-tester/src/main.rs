mod reports;
mod runner;
mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use runner::{ScenarioResult, ScenarioRunner};
use scenario::{get_scenario, list_scenarios};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "deckforge-tester", version = "0.1.0")]
#[command(about = "Scenario runner for the Deckforge deck builder against a scripted validator")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&args.seeds)?;
    let results = run_scenarios(&args, &scenarios, &seeds).await;

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target, "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target, "  {key:20} - {description}")?;
    }
    output_target.flush()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🃏 Deckforge Scenario Tester".bright_cyan().bold());
    println!("{}", "============================".cyan());
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        scenarios.extend(list_scenarios().into_iter().map(|(key, _)| key.to_string()));
    }
    scenarios
}

fn parse_seeds(seeds_arg: &str) -> Result<Vec<u64>> {
    split_csv(seeds_arg)
        .iter()
        .map(|token| {
            let parsed = match token.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => token.parse(),
            };
            parsed.with_context(|| format!("invalid seed '{token}'"))
        })
        .collect()
}

async fn run_scenarios(args: &Args, scenarios: &[String], seeds: &[u64]) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let runner = ScenarioRunner::new(args.verbose);
    let mut results = Vec::new();
    for key in scenarios {
        let Some(scenario) = get_scenario(key) else {
            eprintln!("⚠️  Unknown scenario: {}", key.yellow());
            continue;
        };
        let scenario_results = runner
            .run_scenario(key, scenario.as_ref(), seeds, args.iterations)
            .await;
        for result in &scenario_results {
            let mark = if result.passed { "✅" } else { "❌" };
            println!("{mark} {} (seed {})", result.scenario_name, result.seed);
        }
        results.extend(scenario_results);
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => reports::generate_json_report(&mut output_target, results)?,
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    output_target,
                    "# Deckforge Scenario Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(output_target, "No scenarios executed.")?;
            } else {
                reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(output_target)?;
            writeln!(output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }
    output_target.flush()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer().flush()
    }
}
