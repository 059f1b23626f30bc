use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand, ValueEnum};
use landmark_pilot_core::{
    ExerciseConfig, LandmarkFrame, LogFormat, Mode, ModeKind, PilotConfig, PilotError,
    RecordSink, Session,
};
use tracing_subscriber::EnvFilter;

fn main() -> landmark_pilot_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Mouse => run_session(&config, ModeKind::Mouse, cli.input.as_deref(), None),
        Commands::Painter => run_session(&config, ModeKind::Painter, cli.input.as_deref(), None),
        Commands::Trainer {
            exercise,
            log,
            format,
            checkpoint_every,
        } => {
            let mut config = config;
            if let Some(name) = exercise {
                config.exercise = ExerciseConfig::preset(&name)
                    .ok_or_else(|| PilotError::config(format!("unknown exercise `{name}`")))?;
            }
            if let Some(path) = log {
                config.recording.output_path = path;
            }
            if let Some(format) = format {
                config.recording.format = format.into();
            }
            run_session(
                &config,
                ModeKind::Trainer,
                cli.input.as_deref(),
                checkpoint_every,
            )
        }
        Commands::Exercises => {
            list_exercises();
            Ok(())
        }
        Commands::CheckConfig => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> landmark_pilot_core::Result<PilotConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            PilotConfig::load(path)
        }
        None => Ok(PilotConfig::default()),
    }
}

fn open_input(path: Option<&Path>) -> landmark_pilot_core::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Streams JSON Lines frames through a session and prints every action as a
/// JSON line on stdout. Trainer sessions also persist their log.
fn run_session(
    config: &PilotConfig,
    kind: ModeKind,
    input: Option<&Path>,
    checkpoint_every: Option<u64>,
) -> landmark_pilot_core::Result<()> {
    let mut session = Session::new(config, kind)?;
    let mut sink = match kind {
        ModeKind::Trainer => {
            tracing::info!(
                exercise = %config.exercise.name,
                log = ?config.recording.output_path,
                "recording trainer log"
            );
            Some(config.recording.open_sink()?)
        }
        ModeKind::Mouse | ModeKind::Painter => None,
    };

    let reader = open_input(input)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    drive(&mut session, reader, &mut out, sink.as_mut(), checkpoint_every)?;

    if let Mode::Trainer(trainer) = session.mode() {
        let state = trainer.state();
        tracing::info!(
            exercise = %trainer.exercise().name,
            reps = state.reps,
            stage = %state.stage,
            "session finished"
        );
    } else {
        tracing::info!(frames = session.frames_processed(), "session finished");
    }
    Ok(())
}

/// Runs the whole input through `session`, then flushes `sink` whether or not
/// the stream ended cleanly. A stream error is reported in preference to a
/// flush error.
fn drive<S: RecordSink>(
    session: &mut Session,
    reader: impl BufRead,
    out: &mut impl Write,
    mut sink: Option<&mut S>,
    checkpoint_every: Option<u64>,
) -> landmark_pilot_core::Result<()> {
    let streamed = stream_frames(session, reader, out, sink.as_deref_mut(), checkpoint_every);

    let flushed = match sink {
        Some(sink) => session.flush(sink).map(Some),
        None => Ok(None),
    };

    match (streamed, flushed) {
        (Err(err), Ok(written)) => {
            if let Some(written) = written {
                tracing::info!(written, "trainer log flushed after input error");
            }
            Err(err)
        }
        (Err(err), Err(flush_err)) => {
            tracing::error!(%flush_err, "trainer log could not be flushed");
            Err(err)
        }
        (Ok(()), Err(flush_err)) => Err(flush_err),
        (Ok(()), Ok(written)) => {
            if let Some(written) = written {
                tracing::info!(written, "trainer log flushed");
            }
            Ok(())
        }
    }
}

fn stream_frames<S: RecordSink>(
    session: &mut Session,
    reader: impl BufRead,
    out: &mut impl Write,
    mut sink: Option<&mut S>,
    checkpoint_every: Option<u64>,
) -> landmark_pilot_core::Result<()> {
    for (index, bytes) in reader.split(b'\n').enumerate() {
        let line_number = index + 1;
        let bytes = bytes?;
        let Ok(line) = std::str::from_utf8(&bytes) else {
            tracing::warn!(line = line_number, "skipping frame that is not valid UTF-8");
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let frame: LandmarkFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(line = line_number, %err, "skipping malformed frame");
                continue;
            }
        };

        let actions = match session.process_frame(&frame) {
            Ok(actions) => actions,
            Err(err @ PilotError::OutOfOrder { .. }) => {
                tracing::warn!(line = line_number, %err, "skipping frame");
                continue;
            }
            Err(err) => return Err(err),
        };

        for action in &actions {
            let line = serde_json::to_string(action)?;
            writeln!(out, "{line}")?;
        }

        if let (Some(sink), Some(every)) = (sink.as_deref_mut(), checkpoint_every) {
            if every > 0 && session.frames_processed() % every == 0 {
                if let Err(err) = session.flush(sink) {
                    tracing::warn!(%err, "checkpoint failed, records kept for the next flush");
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn list_exercises() {
    for exercise in ExerciseConfig::presets() {
        println!(
            "{:<12} joint {:>2}-{:>2}-{:<2}  down >= {:>5.1}  up <= {:>5.1}",
            exercise.name,
            exercise.joint.first,
            exercise.joint.vertex,
            exercise.joint.last,
            exercise.upper_threshold,
            exercise.lower_threshold,
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Gesture and pose driven controls from a landmark stream", long_about = None)]
struct Cli {
    /// JSON configuration file. Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// JSON Lines file of landmark frames. Reads stdin when omitted.
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the pointer with the index fingertip; pinch to click.
    Mouse,
    /// Draw with a pointing finger; make a fist to clear the canvas.
    Painter,
    /// Count exercise repetitions and log the joint angle.
    Trainer {
        /// Built-in exercise preset, overriding the configured exercise.
        #[arg(short, long)]
        exercise: Option<String>,
        /// Output path for the session log.
        #[arg(short, long)]
        log: Option<PathBuf>,
        #[arg(short, long, value_enum)]
        format: Option<LogFormatArg>,
        /// Flush the log every N frames instead of only at the end.
        #[arg(long)]
        checkpoint_every: Option<u64>,
    },
    /// List the built-in exercise presets.
    Exercises,
    /// Validate the configuration and print it with defaults filled in.
    CheckConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormatArg {
    Csv,
    JsonLines,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Csv => LogFormat::Csv,
            LogFormatArg::JsonLines => LogFormat::JsonLines,
        }
    }
}

#[cfg(test)]
mod tests {
    use landmark_pilot_core::{landmark::pose, MemorySink};

    use super::*;

    fn trainer_session() -> Session {
        Session::new(&PilotConfig::default(), ModeKind::Trainer).unwrap()
    }

    fn elbow_line(timestamp: f64) -> String {
        let frame = LandmarkFrame::new(timestamp)
            .with_point(pose::RIGHT_SHOULDER, 0.7, 0.5)
            .with_point(pose::RIGHT_ELBOW, 0.5, 0.5)
            .with_point(pose::RIGHT_WRIST, 0.5, 0.3);
        serde_json::to_string(&frame).unwrap()
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut input = Vec::new();
        input.extend_from_slice(elbow_line(0.0).as_bytes());
        input.extend_from_slice(b"\n\xff\xfe\n");
        input.extend_from_slice(elbow_line(0.1).as_bytes());
        input.push(b'\n');

        let mut session = trainer_session();
        let mut sink = MemorySink::default();
        let mut out = Vec::new();
        drive(&mut session, &input[..], &mut out, Some(&mut sink), None).unwrap();

        assert_eq!(sink.records.len(), 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn records_are_flushed_when_output_fails() {
        let input = format!("{}\n{}\n", elbow_line(0.0), elbow_line(0.1));

        let mut session = trainer_session();
        let mut sink = MemorySink::default();
        let err = drive(
            &mut session,
            input.as_bytes(),
            &mut BrokenPipe,
            Some(&mut sink),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, PilotError::Io(_)));
        assert_eq!(sink.records.len(), 1);
        assert!(session.recorder().pending().is_empty());
    }

    #[test]
    fn checkpoints_flush_during_the_stream() {
        let input: String = (0..5).map(|i| elbow_line(i as f64) + "\n").collect();

        let mut session = trainer_session();
        let mut sink = MemorySink::default();
        let mut out = Vec::<u8>::new();
        drive(&mut session, input.as_bytes(), &mut out, Some(&mut sink), Some(2)).unwrap();

        assert_eq!(sink.records.len(), 5);
        assert_eq!(sink.writes, 3);
    }
}
