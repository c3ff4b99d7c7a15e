use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use gifstream::sched::NetworkConfig;
use gifstream::session::{Presenter, SessionConfig, SessionHandle, SessionId, SessionOutcome};
use gifstream::Runtime;
use tracing::{info, warn};

use crate::cmd::{parse_delay, parse_duration, PlayArgs};
use crate::dump::{frame_path, write_ppm};
use crate::exit::{io_error, sched_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, print_session_end, FrameReport, OutputFormat, SessionEndReport};

const POLL: Duration = Duration::from_millis(100);

pub fn run(args: PlayArgs, format: OutputFormat) -> CliResult<i32> {
    let restart_delay = parse_delay(&args.restart_delay)?;
    let stop_at = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|limit| Instant::now() + limit);
    if let Some(dir) = &args.dump_dir {
        std::fs::create_dir_all(dir).map_err(|err| io_error("create dump dir", err))?;
    }

    let mut config = SessionConfig::default()
        .with_restart_delay(restart_delay)
        .with_honour_delays(!args.no_delays);
    if let Some(sessions) = args.sessions {
        config = config.with_max_sessions(sessions);
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (events, limit_reached) = mpsc::channel();
    let presenter = Arc::new(PlayPresenter::new(
        format,
        args.dump_dir.clone(),
        args.frames,
        events,
    ));

    let runtime = Runtime::start(args.transport.engine()?, NetworkConfig::default())
        .map_err(|err| sched_error("start schedulers", err))?;
    let driver = runtime.driver(presenter.clone(), config);
    let handles: Vec<SessionHandle> = args
        .sources
        .iter()
        .map(|source| {
            let handle = driver.start(source.clone());
            info!(session = %handle.id(), source = %source, "session started");
            handle
        })
        .collect();

    while running.load(Ordering::SeqCst) {
        if handles.iter().all(SessionHandle::is_finished) {
            break;
        }
        if stop_at.is_some_and(|at| Instant::now() >= at) {
            info!("duration elapsed");
            break;
        }
        match limit_reached.recv_timeout(POLL) {
            Ok(()) => {
                info!(frames = presenter.delivered(), "frame limit reached");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for handle in &handles {
        handle.stop();
    }
    runtime
        .shutdown()
        .map_err(|err| sched_error("stop schedulers", err))?;

    let tally = presenter.take_tally();
    info!(
        frames = presenter.delivered(),
        completed = tally.completed,
        failed = tally.failed,
        "playback finished"
    );

    // Nothing ever played: report why.
    if presenter.delivered() == 0 && tally.completed == 0 {
        if let Some(err) = tally.last_error {
            return Err(err);
        }
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[derive(Default)]
struct Tally {
    completed: u64,
    failed: u64,
    last_error: Option<CliError>,
}

/// Prints frames, dumps them when asked and signals the frame limit.
struct PlayPresenter {
    format: OutputFormat,
    dump_dir: Option<PathBuf>,
    frame_limit: Option<u64>,
    delivered: AtomicU64,
    /// Frame number within each session's current attempt.
    frame_numbers: Mutex<HashMap<SessionId, u64>>,
    tally: Mutex<Tally>,
    limit_reached: Sender<()>,
}

impl PlayPresenter {
    fn new(
        format: OutputFormat,
        dump_dir: Option<PathBuf>,
        frame_limit: Option<u64>,
        limit_reached: Sender<()>,
    ) -> Self {
        Self {
            format,
            dump_dir,
            frame_limit,
            delivered: AtomicU64::new(0),
            frame_numbers: Mutex::new(HashMap::new()),
            tally: Mutex::new(Tally::default()),
            limit_reached,
        }
    }

    fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst).min(self.frame_limit.unwrap_or(u64::MAX))
    }

    fn take_tally(&self) -> Tally {
        std::mem::take(&mut *self.tally.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Presenter for PlayPresenter {
    fn deliver_frame(&self, canvas: &[u32], width: u16, height: u16, session: SessionId) {
        let delivered = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        if self.frame_limit.is_some_and(|limit| delivered > limit) {
            return;
        }

        let frame = {
            let mut numbers = self
                .frame_numbers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let number = numbers.entry(session).or_insert(0);
            *number += 1;
            *number
        };

        let report = FrameReport::new(session, frame, canvas, width, height);
        print_frame(&report, canvas, self.format);

        if let Some(dir) = &self.dump_dir {
            let path = frame_path(dir, session, delivered);
            if let Err(err) = write_ppm(&path, canvas, width, height) {
                warn!(path = %path.display(), error = %err, "failed to dump frame");
            }
        }

        if self.frame_limit == Some(delivered) {
            let _ = self.limit_reached.send(());
        }
    }

    fn session_ended(&self, session: SessionId, attempt: u64, outcome: &SessionOutcome) {
        self.frame_numbers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);

        let error = outcome.error();
        {
            let mut tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
            match error {
                None => tally.completed += 1,
                Some(err) => {
                    tally.failed += 1;
                    tally.last_error = Some(session_error(&session.to_string(), err));
                }
            }
        }

        let report = SessionEndReport {
            event: "session_ended",
            session,
            attempt,
            completed: outcome.is_completed(),
            summary: outcome.summary(),
            error_kind: error.map(|err| err.kind()),
            error: error.map(ToString::to_string),
        };
        print_session_end(&report, self.format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifstream::session::{SessionError, StreamSummary};

    fn presenter(limit: Option<u64>) -> (PlayPresenter, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        (PlayPresenter::new(OutputFormat::Raw, None, limit, tx), rx)
    }

    #[test]
    fn signals_once_when_frame_limit_is_reached() {
        let (presenter, rx) = presenter(Some(2));
        let session = SessionId::new(1);

        presenter.deliver_frame(&[0], 1, 1, session);
        assert!(rx.try_recv().is_err());
        presenter.deliver_frame(&[0], 1, 1, session);
        presenter.deliver_frame(&[0], 1, 1, session);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(presenter.delivered(), 2);
    }

    #[test]
    fn tallies_outcomes_and_keeps_last_error() {
        let (presenter, _rx) = presenter(None);
        let session = SessionId::new(7);

        presenter.session_ended(
            session,
            1,
            &SessionOutcome::Completed(StreamSummary::default()),
        );
        presenter.session_ended(
            session,
            2,
            &SessionOutcome::Failed(SessionError::UnknownBlockTag(0x42)),
        );

        let tally = presenter.take_tally();
        assert_eq!(tally.completed, 1);
        assert_eq!(tally.failed, 1);
        let err = tally.last_error.expect("failure recorded");
        assert_eq!(err.code, crate::exit::DATA_INVALID);
        assert!(err.message.starts_with("session-7: "));
    }

    #[test]
    fn frame_numbers_restart_with_each_attempt() {
        let (presenter, _rx) = presenter(None);
        let session = SessionId::new(1);

        presenter.deliver_frame(&[0], 1, 1, session);
        presenter.deliver_frame(&[0], 1, 1, session);
        presenter.session_ended(
            session,
            1,
            &SessionOutcome::Completed(StreamSummary::default()),
        );
        presenter.deliver_frame(&[0], 1, 1, session);

        let numbers = presenter.frame_numbers.lock().unwrap();
        assert_eq!(numbers.get(&session), Some(&1));
    }
}
