use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use gifstream::sched::NetworkConfig;
use gifstream::session::{Presenter, SessionConfig, SessionId, SessionOutcome, StreamSummary};
use gifstream::Runtime;
use tracing::debug;

use crate::cmd::{parse_duration, InspectArgs};
use crate::exit::{sched_error, session_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_inspect, InspectReport, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let runtime = Runtime::start(args.transport.engine()?, NetworkConfig::default())
        .map_err(|err| sched_error("start schedulers", err))?;

    let presenter = Arc::new(InspectPresenter::default());
    let config = SessionConfig::default()
        .with_max_sessions(1)
        .with_honour_delays(false);
    let handle = runtime.driver(presenter.clone(), config).start(args.source.clone());
    let finished = handle.wait_timeout(timeout);
    handle.stop();
    runtime
        .shutdown()
        .map_err(|err| sched_error("stop schedulers", err))?;

    if !finished {
        return Err(CliError::new(
            TIMEOUT,
            format!("{}: stream did not finish within {}", args.source, args.timeout),
        ));
    }

    let frames_delivered = presenter.frames.load(Ordering::SeqCst);
    let outcome = presenter
        .outcome
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let (summary, failure) = match outcome {
        Some(Ok(summary)) => (Some(summary), None),
        Some(Err(err)) => (None, Some(err)),
        None => {
            return Err(CliError::new(
                INTERNAL,
                format!("{}: session ended without an outcome", args.source),
            ))
        }
    };

    let message = failure.as_ref().map(|(_, err)| err.message.clone());
    let report = InspectReport {
        source: &args.source,
        ok: failure.is_none(),
        frames_delivered,
        summary: summary.as_ref(),
        error_kind: failure.as_ref().map(|(kind, _)| *kind),
        error: message.as_deref(),
    };
    print_inspect(&report, format);

    match failure {
        Some((_, err)) => Ok(err.code),
        None => Ok(SUCCESS),
    }
}

type Failure = (&'static str, CliError);

/// Counts frames and keeps the single attempt's outcome.
#[derive(Default)]
struct InspectPresenter {
    frames: AtomicU64,
    outcome: Mutex<Option<Result<StreamSummary, Failure>>>,
}

impl Presenter for InspectPresenter {
    fn deliver_frame(&self, _canvas: &[u32], width: u16, height: u16, session: SessionId) {
        let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%session, frame, width, height, "frame decoded");
    }

    fn session_ended(&self, session: SessionId, _attempt: u64, outcome: &SessionOutcome) {
        let result = match outcome {
            SessionOutcome::Completed(summary) => Ok(summary.clone()),
            SessionOutcome::Failed(err) => {
                Err((err.kind(), session_error(&session.to_string(), err)))
            }
        };
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }
}
