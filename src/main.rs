use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use is_terminal::IsTerminal;

mod diff;
mod engine;
mod files;
mod logging;
mod merge;
mod output;
mod pipeline;
mod review;
mod rules;
mod term;

use engine::RuleEngine;
use output::{ApplyOptions, OutputMode, apply_accepted};
use pipeline::{PipelineReport, RewriteRecord, run_pipeline};
use review::run_review;
use rules::BuiltinRules;
use term::{StdinInput, TerminalScreen};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "srcmend",
    version,
    about = "Automated source repair with reviewable, mergeable rewrites",
    after_help = "EXAMPLES:\n  srcmend src/main src/test\n  srcmend --in-place --accept=1125,1155 Test.java"
)]
struct Cli {
    /// Files or directories to analyze; directories expand recursively.
    #[arg(value_name = "PATH", required = true, value_hint = ValueHint::AnyPath)]
    paths: Vec<PathBuf>,

    /// Accept all rewrites without asking.
    #[arg(long = "accept-all", action = ArgAction::SetTrue)]
    accept_all: bool,

    /// Comma-separated list of rule ids to accept.
    #[arg(long = "accept", value_name = "RULES", value_delimiter = ',')]
    accept: Vec<u32>,

    /// Disable interaction, rewrite files on disk.
    #[arg(long = "in-place", action = ArgAction::SetTrue)]
    in_place: bool,

    /// Disable interaction, output a patch to stdout.
    #[arg(long = "patch", action = ArgAction::SetTrue, conflicts_with = "in_place")]
    patch: bool,

    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,

    /// Context lines around each change in rendered diffs.
    #[arg(long, default_value_t = 3, value_name = "N")]
    context: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let bulk_accept = cli.accept_all || !cli.accept.is_empty();
    if bulk_accept && !cli.in_place && !cli.patch {
        bail!("--accept-all/--accept need --in-place or --patch to apply their result");
    }

    let engine = BuiltinRules;
    let targets = files::resolve_targets(&cli.paths, &engine)?;

    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let show_progress = io::stderr().is_terminal();
    let mut report = run_pipeline(&engine, &targets, workers, show_progress);
    report_read_failures(&report);

    if report.records.is_empty() {
        println!("no rewrites found in {} file(s)", targets.len());
        return Ok(());
    }

    if cli.in_place || cli.patch {
        mark_accepted(&mut report.records, cli.accept_all, &cli.accept);
        let mode = if cli.in_place {
            OutputMode::InPlace
        } else {
            OutputMode::Patch
        };
        let stats = apply_accepted(
            &report.records,
            ApplyOptions {
                mode,
                context: cli.context,
                journal: cli.in_place,
            },
        );
        stats.print();
        return Ok(());
    }

    run_interactive(&engine, &mut report.records, &cli)
}

fn run_interactive(
    engine: &dyn RuleEngine,
    records: &mut [RewriteRecord],
    cli: &Cli,
) -> Result<()> {
    if !io::stdin().is_terminal() {
        println!(
            "{} rewrite(s) found; stdin is not a terminal, so interactive review is unavailable.",
            records.len()
        );
        println!("rerun with --patch to print a diff or --in-place to rewrite files");
        return Ok(());
    }

    let mut input = StdinInput;
    let mut screen = TerminalScreen::new(cli.color.should_color(), cli.context);
    run_review(records, engine, &mut input, &mut screen);

    if !records.iter().any(|record| record.accepted) {
        println!("no rewrites accepted; nothing to do");
        return Ok(());
    }

    let stats = apply_accepted(
        records,
        ApplyOptions {
            mode: OutputMode::InPlace,
            context: cli.context,
            journal: true,
        },
    );
    stats.print();
    Ok(())
}

/// Flip `accepted` according to the bulk-accept flags: everything under
/// `--accept-all`, otherwise only rules in the `--accept` allow-list.
fn mark_accepted(records: &mut [RewriteRecord], accept_all: bool, allow_list: &[u32]) {
    for record in records.iter_mut() {
        if accept_all || allow_list.contains(&record.rule_id) {
            record.accepted = true;
        }
    }
}

fn report_read_failures(report: &PipelineReport) {
    for (path, message) in &report.read_failures {
        eprintln!("unable to read {}: {message}", path.display());
    }
}
