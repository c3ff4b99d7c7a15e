use std::sync::Arc;

use gifstream_sched::{
    DeadlineScheduler, NetworkConfig, NetworkScheduler, SchedError, SchedulerThread,
};
use gifstream_session::{Presenter, SessionConfig, SessionDriver};
use gifstream_transport::TransportEngine;

/// A network and a deadline scheduler, each running on its own thread.
///
/// ```no_run
/// use std::sync::Arc;
/// use gifstream::Runtime;
/// use gifstream::sched::NetworkConfig;
/// use gifstream::session::{SessionConfig, SessionId};
/// use gifstream::transport::{FileTransport, FileTransportConfig};
///
/// let runtime = Runtime::start(
///     FileTransport::new(FileTransportConfig::default()),
///     NetworkConfig::default(),
/// )?;
/// let presenter = Arc::new(|_: &[u32], w: u16, h: u16, id: SessionId| {
///     println!("{id}: {w}x{h} frame");
/// });
/// let driver = runtime.driver(presenter, SessionConfig::default().with_max_sessions(1));
/// driver.start("anim.gif").wait_timeout(std::time::Duration::from_secs(5));
/// runtime.shutdown()?;
/// # Ok::<(), gifstream::sched::SchedError>(())
/// ```
pub struct Runtime {
    net: Arc<NetworkScheduler>,
    deadline: Arc<DeadlineScheduler>,
    threads: Vec<SchedulerThread>,
}

impl Runtime {
    /// Start both scheduler threads around `engine`.
    pub fn start(
        engine: impl TransportEngine + 'static,
        config: NetworkConfig,
    ) -> Result<Self, SchedError> {
        let net = Arc::new(NetworkScheduler::new(engine, config));
        let deadline = Arc::new(DeadlineScheduler::new());

        let net_thread = net.spawn_thread("gifstream-net")?;
        let deadline_thread = match deadline.spawn_thread("gifstream-deadline") {
            Ok(thread) => thread,
            Err(err) => {
                net.shutdown();
                net_thread.join()?;
                return Err(err);
            }
        };

        Ok(Self {
            net,
            deadline,
            threads: vec![net_thread, deadline_thread],
        })
    }

    pub fn net(&self) -> &Arc<NetworkScheduler> {
        &self.net
    }

    pub fn deadline(&self) -> &Arc<DeadlineScheduler> {
        &self.deadline
    }

    /// A session driver bound to this runtime's schedulers.
    pub fn driver(&self, presenter: Arc<dyn Presenter>, config: SessionConfig) -> SessionDriver {
        SessionDriver::new(
            Arc::clone(&self.net),
            Arc::clone(&self.deadline),
            presenter,
            config,
        )
    }

    /// Stop both schedulers, drop their pending work and join the threads.
    pub fn shutdown(self) -> Result<(), SchedError> {
        self.net.shutdown();
        self.deadline.shutdown();
        let mut result = Ok(());
        for thread in self.threads {
            if let Err(err) = thread.join() {
                result = Err(err);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifstream_codec::{GifWriter, ImageDescriptor, Palette};
    use gifstream_session::SessionId;
    use gifstream_transport::{MemoryTransport, Script};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn runtime_drives_a_session_end_to_end() {
        let palette = Palette::from_rgb([[0, 0, 255]]).unwrap();
        let gif = GifWriter::new(1, 1)
            .image(ImageDescriptor::new(0, 0, 1, 1), Some(&palette), &[0], 2)
            .unwrap()
            .finish();
        let engine = MemoryTransport::new().with_script("mem", Script::chunked(gif, 4));
        let runtime = Runtime::start(engine, NetworkConfig::default()).unwrap();

        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        let presenter = Arc::new(move |canvas: &[u32], _: u16, _: u16, _: SessionId| {
            sink.lock().unwrap().push(canvas.to_vec());
        });
        let driver = runtime.driver(presenter, SessionConfig::default().with_max_sessions(1));
        let handle = driver.start("mem");

        assert!(handle.wait_timeout(Duration::from_secs(10)));
        assert_eq!(*frames.lock().unwrap(), vec![vec![0xFF00_00FF]]);
        runtime.shutdown().unwrap();
    }
}
