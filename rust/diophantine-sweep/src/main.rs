//! diophantine-sweep CLI: brute-force search for a^b − c^d = 6.
//!
//! Modes:
//!   (default)                          One sweep over four ranges
//!   --interval=START,WIDTH,MAX         Repeated sweeps over [lo, lo+WIDTH-1]
//!
//! Options (anything missing is asked for interactively):
//!   --a=MIN,MAX --b=MIN,MAX --c=MIN,MAX --d=MIN,MAX   Search ranges
//!   --repo=owner/repo/path/file.json   Push target
//!   --token=<token>                    Access token (default: $GITHUB_TOKEN)
//!   --auto                             Interval mode: advance without asking
//!   --workers=<N>                      Worker count (default: all cores)
//!   --capacity=<N>                     Streaming channel bound (default: 1024)
//!   --ceiling-bits=<N>                 Overflow ceiling in bits (default: 2^20)
//!   --top=<N>                          Histogram buckets to report (default: 10)
//!   --batched                          Pooled batch delivery instead of streaming
//!   --out-dir=<path>                   Local output directory (default: results)
//!   --max-digits=<N>                   Longest integer written as a JSON number
//!   --keep-local                       Keep local document after a push
//!   --dry-run                          Write locally, do not publish

use diophantine_sweep::config::SweepConfig;
use diophantine_sweep::github::GitHubStore;
use diophantine_sweep::prompt::Prompter;
use diophantine_sweep::publish::RepoTarget;
use diophantine_sweep::range::{RangeSet, SearchRange};
use diophantine_sweep::schedule::{self, Advance, IntervalSchedule};
use diophantine_sweep::worker::Delivery;
use diophantine_sweep::{publish_sweep, run_sweep, SweepError};

/// CLI configuration parsed from command-line arguments.
struct CliConfig {
    sweep: SweepConfig,
    ranges: [Option<SearchRange>; 4],
    interval: Option<Vec<i64>>,
    auto: bool,
    repo: Option<String>,
    token: Option<String>,
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("--{}=", name);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn parse_flag<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    let raw = flag_value(args, name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("Warning: ignoring unparsable --{}={}", name, raw);
            None
        }
    }
}

fn parse_args() -> CliConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut sweep = SweepConfig::default();

    if let Some(n) = parse_flag::<usize>(&args, "workers") {
        sweep.workers = n.max(1);
    }
    if let Some(n) = parse_flag::<usize>(&args, "capacity") {
        sweep.channel_capacity = n.max(1);
    }
    if let Some(n) = parse_flag::<u64>(&args, "ceiling-bits") {
        sweep.magnitude_ceiling_bits = n;
    }
    if let Some(n) = parse_flag::<usize>(&args, "top") {
        sweep.top_n = n;
    }
    if let Some(n) = parse_flag::<usize>(&args, "max-digits") {
        sweep.document.max_integer_digits = n;
    }
    if let Some(dir) = flag_value(&args, "out-dir") {
        sweep.output_dir = dir.into();
    }
    if args.iter().any(|a| a == "--batched") {
        sweep.delivery = Delivery::Batched;
    }
    sweep.keep_local = args.iter().any(|a| a == "--keep-local");
    sweep.dry_run = args.iter().any(|a| a == "--dry-run");

    let ranges = ["a", "b", "c", "d"].map(|var| {
        let raw = flag_value(&args, var)?;
        match SearchRange::parse(raw) {
            Ok(r) => Some(r),
            Err(e) => {
                eprintln!("Warning: --{}={}: {}; will ask instead", var, raw, e);
                None
            }
        }
    });

    let interval = flag_value(&args, "interval").map(|raw| {
        raw.split(',')
            .filter_map(|s| s.trim().parse::<i64>().ok())
            .collect()
    });

    CliConfig {
        sweep,
        ranges,
        interval,
        auto: args.iter().any(|a| a == "--auto"),
        repo: flag_value(&args, "repo").map(str::to_string),
        token: flag_value(&args, "token")
            .map(str::to_string)
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())),
    }
}

fn main() {
    env_logger::init();

    let cli = parse_args();

    println!("==============================================");
    println!("  diophantine-sweep: a^b - c^d = {}", cli.sweep.target);
    println!("==============================================");
    println!();

    let result = if cli.interval.is_some() {
        run_interval_mode(cli)
    } else {
        run_single_mode(cli)
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Ranges from the command line, falling back to prompts for the rest.
fn collect_ranges(
    given: [Option<SearchRange>; 4],
    prompter: &mut Prompter<std::io::StdinLock<'static>, std::io::Stdout>,
) -> Result<RangeSet, SweepError> {
    if let [Some(a), Some(b), Some(c), Some(d)] = given {
        match RangeSet::new(a, b, c, d) {
            Ok(set) => return Ok(set),
            Err(e) => eprintln!("Warning: {}; will ask instead", e),
        }
    }
    let mut ranges = [SearchRange::single(0); 4];
    for (i, var) in ['a', 'b', 'c', 'd'].into_iter().enumerate() {
        ranges[i] = match given[i] {
            Some(r) => r,
            None => prompter.read_range(var, var == 'b' || var == 'd')?,
        };
    }
    match RangeSet::new(ranges[0], ranges[1], ranges[2], ranges[3]) {
        Ok(set) => Ok(set),
        Err(e) => {
            eprintln!("  {}. Please enter all four ranges again.", e);
            Ok(prompter.read_range_set()?)
        }
    }
}

/// Repository target and store, unless this is a dry run.
fn collect_remote(
    repo: Option<String>,
    token: Option<String>,
    dry_run: bool,
    prompter: &mut Prompter<std::io::StdinLock<'static>, std::io::Stdout>,
) -> Result<Option<(RepoTarget, GitHubStore)>, SweepError> {
    if dry_run {
        return Ok(None);
    }
    let target = match repo.map(|r| r.parse::<RepoTarget>()) {
        Some(Ok(t)) => t,
        Some(Err(e)) => {
            eprintln!("Warning: {}", e);
            prompter.read_repo_target()?
        }
        None => prompter.read_repo_target()?,
    };
    let token = match token {
        Some(t) => t,
        None => prompter.read_token()?,
    };
    Ok(Some((target, GitHubStore::new(token))))
}

fn run_single_mode(cli: CliConfig) -> Result<(), SweepError> {
    let mut prompter = Prompter::stdio();
    let ranges = collect_ranges(cli.ranges, &mut prompter)?;
    let remote = collect_remote(cli.repo, cli.token, cli.sweep.dry_run, &mut prompter)?;

    println!("Searching {} ({} tuples) on {} workers", ranges, ranges.total(), cli.sweep.workers);
    let outcome = run_sweep(&ranges, &cli.sweep)?;
    print_summary(&outcome.diagnostics);

    match remote {
        Some((target, store)) => {
            let published = publish_sweep(&outcome, &store, &target, &cli.sweep)?;
            println!("  Published:       {} ({})", target, published);
        }
        None => println!("  Dry run: document kept at {}", outcome.document_path.display()),
    }
    Ok(())
}

fn run_interval_mode(cli: CliConfig) -> Result<(), SweepError> {
    let mut prompter = Prompter::stdio();

    let schedule = match cli.interval.as_deref() {
        Some(&[start, width, max]) => match IntervalSchedule::new(start, width, max) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Warning: --interval: {}; will ask instead", e);
                prompter.read_schedule()?
            }
        },
        _ => prompter.read_schedule()?,
    };
    let remote = collect_remote(cli.repo, cli.token, cli.sweep.dry_run, &mut prompter)?;
    let advance = if cli.auto { Advance::Auto } else { Advance::Manual };
    let config = cli.sweep;

    let completed = schedule::drive::<SweepError, _, _>(
        &schedule,
        advance,
        |interval| {
            let ranges = RangeSet::uniform(interval)?;
            println!();
            println!("--- Interval {} ({} tuples) ---", interval, ranges.total());
            let outcome = run_sweep(&ranges, &config)?;
            print_summary(&outcome.diagnostics);
            if let Some((target, store)) = &remote {
                let target = target.with_interval_suffix(interval.min, interval.max);
                let published = publish_sweep(&outcome, store, &target, &config)?;
                println!("  Published:       {} ({})", target, published);
            }
            Ok(())
        },
        |next| Ok(prompter.confirm(&format!("Continue with interval {}?", next))?),
    )?;

    println!();
    println!("Completed {} interval sweep(s).", completed);
    Ok(())
}

fn print_summary(diagnostics: &diophantine_sweep::aggregate::Diagnostics) {
    println!();
    println!("┌────────────────────────────────────────────┐");
    println!("│               Sweep summary                │");
    println!("└────────────────────────────────────────────┘");
    println!("{}", diagnostics);
}
