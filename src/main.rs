use clap::{Parser, Subcommand};
use chrono::Local;
use log::debug;
use postedit::{
    clock::SystemClock,
    config::{ConfigStore, FileConfigStore},
    effort::{self, Distribution, PostEditEffort, TemporalEffort},
    export::{self, ExportFormat},
    metrics::EditMetrics,
    segments::{load_segment_files, Segment},
    store::{ProgressStore, UserProgress},
    util::format_duration,
    Error as PostEditError, SegmentTimeTracker,
};
use std::{error::Error, fs, io::Write, path::PathBuf};

/// reports over post-editing progress: effort metrics, editing time and exports
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Reads the post-editing progress database and reports editing effort (HTER-like edit rate, throughput, time per word), per-segment editing time, and exports translators' metrics as CSV or JSON."
)]
pub struct Cli {
    /// progress database (defaults to the configured or platform location)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list translators with saved work
    Users,
    /// project-wide post-editing effort
    Overview,
    /// post-editing effort of one translator
    User {
        #[clap(long)]
        name: String,
        #[clap(long)]
        surname: String,
    },
    /// per-segment editing time from a translator's stored tracker
    Times {
        #[clap(long)]
        name: String,
        #[clap(long)]
        surname: String,
    },
    /// export a translator's segment metrics
    Export {
        #[clap(long)]
        name: String,
        #[clap(long)]
        surname: String,
        /// output format
        #[clap(short = 'f', long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// write to a file instead of stdout; without a value the format's default name is used
        #[clap(short = 'o', long)]
        output: Option<Option<PathBuf>>,
    },
    /// export every translator's metrics in one table with a user column
    ExportAll {
        /// output format
        #[clap(short = 'f', long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// write to a file instead of stdout; without a value the format's default name is used
        #[clap(short = 'o', long)]
        output: Option<Option<PathBuf>>,
    },
    /// remove a translator's stored progress
    Delete {
        #[clap(long)]
        name: String,
        #[clap(long)]
        surname: String,
        /// confirm the deletion
        #[clap(long)]
        yes: bool,
    },
    /// preview the segments a source and a translation file pair into
    Segments {
        source: PathBuf,
        translation: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_store = FileConfigStore::new();
    debug!("reading config from {}", config_store.path().display());
    let config = config_store.load();

    if let Command::Segments {
        source,
        translation,
    } = &cli.command
    {
        print_segments(&load_segment_files(source, translation)?);
        return Ok(());
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.resolved_database_path());
    let store = ProgressStore::open(&db_path)?;

    match cli.command {
        Command::Users => print_users(&store)?,
        Command::Overview => print_overview(&store)?,
        Command::User { name, surname } => {
            let progress = load_user(&store, &name, &surname)?;
            print_user_effort(&progress);
        }
        Command::Times { name, surname } => {
            let progress = load_user(&store, &name, &surname)?;
            print_times(&progress)?;
        }
        Command::Export {
            name,
            surname,
            format,
            output,
        } => {
            let progress = load_user(&store, &name, &surname)?;
            let rendered = export::export(format, &progress.metrics)?;
            write_output(&rendered, output, format, format.default_file_name())?;
        }
        Command::ExportAll { format, output } => {
            let users = store.all_users()?;
            let rendered = export::export_project(format, &users)?;
            write_output(&rendered, output, format, format.project_file_name())?;
        }
        Command::Delete {
            name,
            surname,
            yes,
        } => {
            if !yes {
                return Err(format!("refusing to delete {name} {surname} without --yes").into());
            }
            if !store.delete(&name, &surname)? {
                return Err(PostEditError::UnknownUser { name, surname }.into());
            }
            println!("Deleted stored progress for {name} {surname}.");
        }
        Command::Segments { .. } => {}
    }

    Ok(())
}

fn write_output(
    rendered: &str,
    output: Option<Option<PathBuf>>,
    format: ExportFormat,
    default_name: &str,
) -> std::io::Result<()> {
    match output {
        Some(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(default_name));
            fs::write(&path, rendered)?;
            println!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if format == ExportFormat::Json {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}

fn load_user(
    store: &ProgressStore,
    name: &str,
    surname: &str,
) -> Result<UserProgress, PostEditError> {
    store
        .load(name, surname)?
        .ok_or_else(|| PostEditError::UnknownUser {
            name: name.to_string(),
            surname: surname.to_string(),
        })
}

fn print_users(store: &ProgressStore) -> Result<(), PostEditError> {
    let users = store.all_users()?;
    if users.is_empty() {
        println!("No user data available yet.");
        return Ok(());
    }

    println!(
        "{:<28} {:>8} {:>10} {:>10} {:>6}  last saved",
        "name", "segments", "total", "avg", "edits"
    );
    for stats in effort::user_stats(&users) {
        let last_saved = users
            .iter()
            .find(|u| u.display_name() == stats.name)
            .map(|u| {
                u.last_updated
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default();
        println!(
            "{:<28} {:>8} {:>10} {:>10} {:>6}  {}",
            stats.name,
            stats.segments,
            format_duration(stats.total_time),
            format_duration(stats.avg_time),
            stats.total_edits,
            last_saved
        );
    }
    Ok(())
}

fn print_distribution(label: &str, values: &[f64]) {
    match Distribution::of(values) {
        Some(d) => println!(
            "{label:<22} n={} mean={:.2} sd={:.2} min={:.2} max={:.2}",
            d.count, d.mean, d.std_dev, d.min, d.max
        ),
        None => println!("{label:<22} n=0"),
    }
}

fn print_overview(store: &ProgressStore) -> Result<(), PostEditError> {
    let users = store.all_users()?;
    let metrics = effort::all_metrics(&users);
    if metrics.is_empty() {
        println!("No user data available yet.");
        return Ok(());
    }

    println!("users:                 {}", users.len());
    print_effort(&metrics);
    Ok(())
}

fn print_user_effort(progress: &UserProgress) {
    if progress.metrics.is_empty() {
        println!("No saved segments for {}.", progress.display_name());
        return;
    }
    println!("user:                  {}", progress.display_name());
    print_effort(&progress.metrics);
}

fn print_effort(metrics: &[EditMetrics]) {
    let pe = PostEditEffort::from_metrics(metrics);
    let temporal = TemporalEffort::from_metrics(metrics);

    println!("segments:              {}", metrics.len());
    println!("HTER:                  {:.3}", pe.hter);
    println!("avg edit distance:     {:.2}", pe.avg_edit_distance);
    println!("words/hour:            {:.1}", pe.throughput);
    println!("avg time/word (s):     {:.2}", pe.avg_time_per_word);
    println!("avg time/segment (s):  {:.2}", temporal.avg_time_per_segment);
    println!("processing speed:      {:.2} chars/s", temporal.processing_speed);
    print_distribution("edit distance", &effort::edit_distances(metrics));
    print_distribution("seconds per word", &effort::times_per_word(metrics));
}

fn print_segments(segments: &[Segment]) {
    println!("{} segment(s)", segments.len());
    for (idx, segment) in segments.iter().enumerate() {
        println!("{:>4}  {}", idx + 1, segment.source);
        println!("      {}", segment.translation);
    }
}

fn print_times(progress: &UserProgress) -> Result<(), PostEditError> {
    let tracker = SegmentTimeTracker::from_snapshot(progress.time_tracker.clone(), SystemClock)?;
    if tracker.is_empty() {
        println!("No tracked segments for {}.", progress.display_name());
        return Ok(());
    }

    println!(
        "{:>7} {:>7} {:>10} {:>10} {:>10}",
        "segment", "state", "editing", "idle", "paused"
    );
    for id in tracker.segment_ids() {
        let Some(session) = tracker.session(id) else {
            continue;
        };
        let state = if session.is_paused() { "paused" } else { "active" };
        println!(
            "{:>7} {:>7} {:>10} {:>10} {:>10}",
            id + 1,
            state,
            format_duration(tracker.get_editing_time(id)),
            format_duration(session.idle_time()),
            format_duration(session.total_paused_time())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_defaults_to_csv() {
        let cli = Cli::parse_from(["postedit", "export", "--name", "Ada", "--surname", "Lovelace"]);
        match cli.command {
            Command::Export { format, output, .. } => {
                assert_eq!(format, ExportFormat::Csv);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bare_output_flag_selects_default_file() {
        let cli = Cli::parse_from(["postedit", "export-all", "-f", "json", "-o"]);
        match cli.command {
            Command::ExportAll { format, output } => {
                assert_eq!(format, ExportFormat::Json);
                assert_eq!(output, Some(None));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from(["postedit", "export-all", "-o", "all.csv"]);
        match cli.command {
            Command::ExportAll { output, .. } => {
                assert_eq!(output, Some(Some(PathBuf::from("all.csv"))));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn delete_needs_explicit_confirmation_flag() {
        let cli = Cli::parse_from(["postedit", "delete", "--name", "Ada", "--surname", "L"]);
        assert_matches::assert_matches!(cli.command, Command::Delete { yes: false, .. });
    }

    #[test]
    fn db_flag_is_global() {
        let cli = Cli::parse_from(["postedit", "users", "--db", "/tmp/p.db"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/p.db")));
    }
}
