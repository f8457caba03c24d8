use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Zhipu;
use opinion_common::display::translate;
use opinion_common::{AppConfig, Dimension, FileConfig, Platform};
use opinion_pipeline::analyzer::{cancel_on_ctrl_c, select_pending};
use opinion_pipeline::export::{
    read_clean_json, read_opinion_lines, write_analysis_csv, write_clean_csv, write_clean_json,
    write_json, write_txt,
};
use opinion_pipeline::report::{run_summary, sample};
use opinion_pipeline::results::{
    check_progress, load_analysis, load_analysis_or_default, merge, reindex, save_analysis,
};
use opinion_pipeline::{
    coverage, sources, verify, AnalyzeOptions, Analyzer, Cleaner, FileSink, Filter, Labeler,
    LlmLabeler, Report,
};

#[derive(Parser)]
#[command(name = "opinion", about = "Cross-border e-commerce tax opinion pipeline")]
struct Cli {
    /// Path to config TOML file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the search keyword library
    Keywords {
        #[arg(long)]
        platform: Option<String>,
    },
    /// Dedup, filter and normalize raw crawler output
    Clean {
        /// Explicit raw files instead of the platform directories
        #[arg(long = "input", num_args = 1..)]
        inputs: Vec<PathBuf>,
        /// Platform for items in explicit files that carry none
        #[arg(long, default_value = "weibo")]
        platform: String,
    },
    /// Label clean opinions with the LLM
    Analyze {
        /// Opinion text file, one per line
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip the first N opinions
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Label at most N opinions
        #[arg(long)]
        sample: Option<usize>,
        /// Skip opinions already present in the output file
        #[arg(long)]
        resume: bool,
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Merge two result files; the second wins on conflicts
    Merge {
        base: PathBuf,
        incoming: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Renumber records 1..n in file order, repairing duplicate indexes
    Reindex {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Write here instead of overwriting the input
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write analysis results as CSV
    Export {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show clean and analysis progress against the collection targets
    Progress,
    /// Dashboard metrics over analysis results
    Report {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Filter labeled opinions
    Search {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        sentiment: Option<String>,
        #[arg(long)]
        risk: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Recompute metrics and check they agree
    Verify {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("opinion_pipeline=info".parse()?)
        .add_directive("opinion=info".parse()?)
        .add_directive("ai_client=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = opinion_common::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Command::Keywords { platform } => {
            let words = match platform {
                Some(p) => config.keywords.for_platform(&Platform::parse(&p)),
                None => config.keywords.flat(),
            };
            if cli.json {
                print_json(&words)?;
            } else {
                println!("{}", words.join("\n"));
            }
        }

        Command::Clean { inputs, platform } => {
            config.ensure_dirs()?;
            let load = if inputs.is_empty() {
                sources::load_platform_dirs(&config.paths.raw_dir)?
            } else {
                sources::load_files(&inputs, &Platform::parse(&platform))
            };
            info!(
                posts = load.posts.len(),
                files = load.files_read,
                failed = load.failed_files.len(),
                "Raw data loaded"
            );

            let (opinions, stats) = Cleaner::new(config.clean.clone()).run(load.posts);
            write_txt(&config.paths.clean_txt(), &opinions)?;
            write_clean_json(&config.paths.clean_json(), &opinions)?;
            write_clean_csv(&config.paths.clean_csv(), &opinions)?;
            write_json(&config.paths.clean_stats_json(), &stats)?;

            if cli.json {
                print_json(&stats)?;
            } else {
                println!("{stats}");
            }
        }

        Command::Analyze {
            input,
            output,
            start,
            sample: sample_size,
            resume,
            concurrency,
        } => {
            run_analyze(&config, input, output, start, sample_size, resume, concurrency).await?;
        }

        Command::Merge {
            base,
            incoming,
            output,
        } => {
            let merged = merge(&load_analysis(&base)?, &load_analysis(&incoming)?);
            save_analysis(&output, &merged)?;
            println!("Merged {} records into {}", merged.data.len(), output.display());
        }

        Command::Reindex { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.analysis_json());
            let output = output.unwrap_or_else(|| input.clone());
            let mut file = load_analysis(&input)?;
            let changed = reindex(&mut file);
            save_analysis(&output, &file)?;
            println!(
                "Renumbered {changed} of {} records into {}",
                file.data.len(),
                output.display()
            );
        }

        Command::Export { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.analysis_json());
            let output = output.unwrap_or_else(|| config.paths.analysis_csv());
            let file = load_analysis(&input)?;
            write_analysis_csv(&output, &file.data)?;
            println!("Exported {} records to {}", file.data.len(), output.display());
        }

        Command::Progress => {
            let clean_txt = config.paths.clean_txt();
            let clean_count = read_opinion_lines(&clean_txt).map(|l| l.len()).unwrap_or(0);
            let analysis = config.paths.analysis_json();
            let status = check_progress(&analysis);
            let collected = read_clean_json(&config.paths.clean_json())
                .map(|file| coverage(&file.data, &config.targets, &config.date_range))
                .ok();

            if cli.json {
                print_json(&serde_json::json!({
                    "clean_opinions": clean_count,
                    "analysis": status,
                    "coverage": collected,
                }))?;
            } else {
                println!("Clean opinions: {clean_count} ({})", clean_txt.display());
                println!("Analysis:       {status} ({})", analysis.display());
                if let Some(collected) = collected {
                    println!("{collected}");
                }
            }
        }

        Command::Report { input } => {
            let path = input.unwrap_or_else(|| config.paths.analysis_json());
            let file = load_analysis(&path)?;
            let report = Report::build(&file.data);
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{report}");
            }
        }

        Command::Search {
            input,
            sentiment,
            risk,
            topic,
            actor,
            pattern,
            keyword,
            limit,
        } => {
            let path = input.unwrap_or_else(|| config.paths.analysis_json());
            let file = load_analysis(&path)?;
            let filter = Filter {
                sentiment,
                risk,
                topic,
                actor,
                pattern,
                keyword,
            };
            let hits = filter.apply(&file.data);
            let shown = sample(&hits, limit);

            if cli.json {
                print_json(&shown)?;
            } else {
                println!("{} matches, showing {}", hits.len(), shown.len());
                for record in shown {
                    let text: String = record.source_text.chars().take(80).collect();
                    println!(
                        "[{}] {} / {} / {} / {}  {}",
                        record.index,
                        translate(Dimension::Sentiment, &record.label(Dimension::Sentiment)),
                        translate(Dimension::Risk, &record.label(Dimension::Risk)),
                        translate(Dimension::Topic, &record.label(Dimension::Topic)),
                        translate(Dimension::Actor, &record.label(Dimension::Actor)),
                        text
                    );
                }
            }
        }

        Command::Verify { input } => {
            let path = input.unwrap_or_else(|| config.paths.analysis_json());
            let file = load_analysis(&path)?;
            let report = verify(&file.data);
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{report}");
            }
            if !report.passed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_analyze(
    config: &FileConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    start: usize,
    sample_size: Option<usize>,
    resume: bool,
    concurrency: Option<usize>,
) -> Result<()> {
    let app = AppConfig::from_env();
    let api_key = app.require_api_key()?;
    let model = app.llm_model.clone().unwrap_or_else(|| config.llm.model.clone());

    let mut chat = Zhipu::new(api_key, model);
    if let Some(url) = &app.llm_base_url {
        chat = chat.with_base_url(url.clone());
    }
    let labeler = LlmLabeler::new(chat, &config.llm);

    let input = input.unwrap_or_else(|| config.paths.clean_txt());
    let output = output.unwrap_or_else(|| config.paths.analysis_json());
    let opinions = read_opinion_lines(&input)
        .with_context(|| format!("Run `opinion clean` first to produce {}", input.display()))?;
    let existing = load_analysis_or_default(&output)?;

    let mut options = AnalyzeOptions::from_config(&config.llm);
    options.start_idx = start;
    options.sample_size = sample_size;
    options.resume = resume;
    if let Some(n) = concurrency {
        options.concurrency = n.max(1);
    }

    let pending = select_pending(&opinions, Some(&existing), &options);
    info!(
        opinions = opinions.len(),
        already_labeled = existing.data.len(),
        pending = pending.len(),
        "Analysis plan"
    );
    if pending.is_empty() {
        println!("Nothing to analyze.");
        return Ok(());
    }

    let mut sink = FileSink::new(&output, existing, labeler.model());
    let analyzer = Analyzer::new(options, cancel_on_ctrl_c());
    let outcome = analyzer.run(&labeler, pending, &mut sink).await?;

    println!("{}", run_summary(&outcome.results));
    println!(
        "Succeeded: {}  Failed: {}  Success rate: {:.1}%  Elapsed: {:.0}s{}",
        outcome.counts.succeeded,
        outcome.counts.failed,
        outcome.success_rate(),
        outcome.elapsed.as_secs_f64(),
        if outcome.cancelled { "  (cancelled)" } else { "" }
    );
    println!("Results saved to {}", sink.path().display());
    Ok(())
}
