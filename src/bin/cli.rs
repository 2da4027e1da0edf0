//! Binary entry point for the flatval command-line tool.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use flatval::admin::{stats, verify, StatsReport, VerifyLevel, VerifyReport};
use flatval::reader::OpenOptions;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "flatval",
    version,
    about = "Inspect and verify flatval buffer files",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(long, global = true, help = "Read files into memory instead of mapping them")]
    no_mmap: bool,

    #[arg(long, global = true, help = "Skip payload checksum verification")]
    no_checksum: bool,

    #[arg(long, global = true, value_name = "DEPTH", help = "Maximum container nesting")]
    max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print header and value statistics")]
    Stats {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    #[command(about = "Verify buffer structure")]
    Verify {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        #[arg(
            long,
            value_enum,
            default_value_t = VerifyLevelArg::Full,
            help = "Verification level"
        )]
        level: VerifyLevelArg,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VerifyLevelArg {
    Fast,
    Full,
}

impl From<VerifyLevelArg> for VerifyLevel {
    fn from(level: VerifyLevelArg) -> Self {
        match level {
            VerifyLevelArg::Fast => VerifyLevel::Fast,
            VerifyLevelArg::Full => VerifyLevel::Full,
        }
    }
}

fn main() {
    install_tracing_subscriber();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_open_options(args: &OpenArgs) -> OpenOptions {
    let mut opts = OpenOptions::default()
        .use_mmap(!args.no_mmap)
        .verify_checksum(!args.no_checksum);
    if let Some(depth) = args.max_depth {
        opts = opts.max_depth(depth);
    }
    opts
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let open_opts = build_open_options(&cli.open);

    match cli.command {
        Command::Stats { path } => {
            let report = stats(&path, &open_opts)?;
            emit(&cli.format, &report, |fmt| print_stats_text(fmt, &report))?;
        }
        Command::Verify { path, level } => {
            let report = verify(&path, &open_opts, level.into())?;
            emit(&cli.format, &report, |fmt| print_verify_text(fmt, &report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_stats_text(_: OutputFormat, report: &StatsReport) {
    println!(
        "File: path={} size={} mapped={}",
        report.file.path, report.file.size_bytes, report.file.mapped
    );
    println!(
        "Header: version={} flags=0x{:08x} checksum={} containers={} root={}",
        report.header.version,
        report.header.flags,
        report.header.checksum_present,
        report.header.n_containers,
        report.header.root_kind
    );
    let v = &report.values;
    println!(
        "Values: total={} strings={} bitvectors={} prim_vectors={} vectors={} maps={} sets={} \
         max_depth={}",
        v.n_values,
        v.n_strings,
        v.n_bitvectors,
        v.n_prim_vectors,
        v.n_vectors,
        v.n_maps,
        v.n_sets,
        v.max_depth
    );
}

fn print_verify_text(_: OutputFormat, report: &VerifyReport) {
    println!(
        "Verify ({:?}) => success={} bytes={} values={} tables={} keys={}",
        report.level,
        report.success,
        report.counts.buffer_len,
        report.counts.values_checked,
        report.counts.tables_probed,
        report.counts.keys_probed,
    );
    for finding in &report.findings {
        println!("- {:?}: {}", finding.severity, finding.message);
    }
}
