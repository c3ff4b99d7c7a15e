use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{ChunkSink, Completion, Progress, TransferId, TransportEngine};

const IDLE_NAP: Duration = Duration::from_millis(5);

struct Route {
    prefix: String,
    engine: Box<dyn TransportEngine>,
}

/// Dispatches each submission to the first engine whose prefix matches.
///
/// Inner transfer ids are mapped onto ids owned by the router so callers see
/// one id space. A route with an empty prefix matches everything.
pub struct RoutingTransport {
    routes: Vec<Route>,
    inner: HashMap<TransferId, (usize, TransferId)>,
    outer: HashMap<(usize, TransferId), TransferId>,
    next_id: u64,
}

impl RoutingTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            inner: HashMap::new(),
            outer: HashMap::new(),
            next_id: 1,
        }
    }

    /// Route sources starting with `prefix` to `engine`.
    pub fn with_route(
        mut self,
        prefix: impl Into<String>,
        engine: impl TransportEngine + 'static,
    ) -> Self {
        self.routes.push(Route {
            prefix: prefix.into(),
            engine: Box::new(engine),
        });
        self
    }

    /// Plain HTTP for `http://` sources and local files for everything else.
    pub fn standard(http: crate::HttpConfig, file: crate::FileTransportConfig) -> Self {
        Self::new()
            .with_route(crate::http::HTTP_SCHEME, crate::HttpTransport::new(http))
            .with_route("", crate::FileTransport::new(file))
    }

    fn route_for(&self, source: &str) -> Option<usize> {
        self.routes
            .iter()
            .position(|route| source.starts_with(route.prefix.as_str()))
    }
}

impl Default for RoutingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportEngine for RoutingTransport {
    fn submit(&mut self, source: &str, sink: Arc<dyn ChunkSink>) -> Result<TransferId> {
        let index = self
            .route_for(source)
            .ok_or_else(|| TransportError::UnsupportedScheme(source.to_string()))?;
        let inner_id = self.routes[index].engine.submit(source, sink)?;

        let id = TransferId::new(self.next_id);
        self.next_id += 1;
        debug!(%id, engine = self.routes[index].engine.name(), source, "transfer routed");

        self.inner.insert(id, (index, inner_id));
        self.outer.insert((index, inner_id), id);
        Ok(id)
    }

    fn remove(&mut self, id: TransferId) {
        if let Some((index, inner_id)) = self.inner.remove(&id) {
            self.outer.remove(&(index, inner_id));
            self.routes[index].engine.remove(inner_id);
        }
    }

    fn perform(&mut self, timeout: Duration) -> Result<Progress> {
        let mut progress = Progress::default();

        for (index, route) in self.routes.iter_mut().enumerate() {
            let step = route.engine.perform(Duration::ZERO)?;
            progress.running += step.running;
            progress.bytes_delivered += step.bytes_delivered;
            for Completion { id: inner_id, outcome } in step.completed {
                let Some(id) = self.outer.remove(&(index, inner_id)) else {
                    continue;
                };
                self.inner.remove(&id);
                progress.completed.push(Completion { id, outcome });
            }
        }

        if progress.is_idle() && progress.running > 0 {
            std::thread::sleep(timeout.min(IDLE_NAP));
        }
        Ok(progress)
    }

    fn name(&self) -> &'static str {
        "routing"
    }
}
