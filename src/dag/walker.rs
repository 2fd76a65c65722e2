use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use colored::Colorize;
use dashmap::DashMap;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use super::resource_graph::{DagNode, ResourceGraph};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Status of a node during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Skipped(String),
}

/// Result of executing a single node.
#[derive(Debug)]
pub struct NodeResult {
    pub node_index: NodeIndex,
    pub address: String,
    pub status: NodeStatus,
    pub outputs: Option<serde_json::Value>,
}

/// Operation mode for the walker. Picks the default progress wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    Apply,
    Destroy,
}

/// What a node is doing, as announced on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Runs without any output (no-op resources).
    Silent,
    Connecting,
    Creating,
    Modifying,
    Destroying,
}

impl Progress {
    /// (in progress, completed) wording.
    fn verbs(self) -> Option<(&'static str, &'static str)> {
        match self {
            Progress::Silent => None,
            Progress::Connecting => Some(("Connecting", "Connection")),
            Progress::Creating => Some(("Creating", "Creation")),
            Progress::Modifying => Some(("Modifying", "Modifications")),
            Progress::Destroying => Some(("Destroying", "Destruction")),
        }
    }
}

/// Callback signature for node execution.
pub type NodeExecutor = Box<
    dyn Fn(
            NodeIndex,
            DagNode,
        ) -> futures::future::BoxFuture<'static, Result<Option<serde_json::Value>>>
        + Send
        + Sync,
>;

type Verbs = Option<(&'static str, &'static str)>;

/// A launched node, shared with the heartbeat task.
struct InFlight {
    address: String,
    started: Instant,
    verbs: Verbs,
}

/// Dependency bookkeeping for one walk. Only the walker loop mutates it.
struct Schedule {
    /// Dependencies of each node that have not succeeded yet.
    unmet: HashMap<NodeIndex, usize>,
    dependents: HashMap<NodeIndex, Vec<NodeIndex>>,
    statuses: HashMap<NodeIndex, NodeStatus>,
}

impl Schedule {
    fn new(graph: &ResourceGraph) -> Self {
        let mut unmet = HashMap::new();
        let mut dependents = HashMap::new();
        let mut statuses = HashMap::new();
        for idx in graph.node_indices() {
            unmet.insert(
                idx,
                graph.neighbors_directed(idx, Direction::Incoming).count(),
            );
            dependents.insert(
                idx,
                graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .collect::<Vec<_>>(),
            );
            statuses.insert(idx, NodeStatus::Pending);
        }
        Self {
            unmet,
            dependents,
            statuses,
        }
    }

    /// Nodes without dependencies, in index order.
    fn roots(&self) -> Vec<NodeIndex> {
        let mut roots: Vec<NodeIndex> = self
            .unmet
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&idx, _)| idx)
            .collect();
        roots.sort();
        roots
    }

    fn start(&mut self, idx: NodeIndex) {
        self.statuses.insert(idx, NodeStatus::Running);
    }

    /// Record a success. Returns the dependents that became ready.
    fn succeed(&mut self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.statuses.insert(idx, NodeStatus::Succeeded);
        let mut ready = Vec::new();
        let Some(dependents) = self.dependents.get(&idx) else {
            return ready;
        };
        for &dependent in dependents {
            if let Some(count) = self.unmet.get_mut(&dependent) {
                *count = count.saturating_sub(1);
                let pending = matches!(self.statuses.get(&dependent), Some(NodeStatus::Pending));
                if *count == 0 && pending {
                    ready.push(dependent);
                }
            }
        }
        ready
    }

    /// Record a failure and skip every transitive dependent that has not
    /// started. A node reachable through two failed parents is skipped once.
    fn fail(&mut self, idx: NodeIndex, status: NodeStatus, reason: &str) -> Vec<NodeIndex> {
        self.statuses.insert(idx, status);
        let mut skipped = Vec::new();
        let mut queue: VecDeque<NodeIndex> = self
            .dependents
            .get(&idx)
            .cloned()
            .unwrap_or_default()
            .into();

        while let Some(next) = queue.pop_front() {
            if !matches!(self.statuses.get(&next), Some(NodeStatus::Pending)) {
                continue;
            }
            self.statuses
                .insert(next, NodeStatus::Skipped(reason.to_string()));
            skipped.push(next);
            if let Some(more) = self.dependents.get(&next) {
                queue.extend(more.iter().copied());
            }
        }
        skipped
    }
}

/// Everything needed to launch a node onto the worker pool.
struct Launcher<'a> {
    graph: &'a ResourceGraph,
    executor: &'a Arc<NodeExecutor>,
    semaphore: &'a Arc<Semaphore>,
    in_flight: &'a Arc<DashMap<NodeIndex, InFlight>>,
    tx: &'a mpsc::Sender<NodeResult>,
    verbs: &'a HashMap<NodeIndex, Verbs>,
}

impl Launcher<'_> {
    fn launch(&self, idx: NodeIndex) {
        let node = self.graph[idx].clone();
        let address = node.address().to_string();
        let verbs = self.verbs.get(&idx).copied().flatten();

        if let Some((doing, _)) = verbs {
            println!("{}: {}...", address, doing.cyan());
        }
        self.in_flight.insert(
            idx,
            InFlight {
                address: address.clone(),
                started: Instant::now(),
                verbs,
            },
        );

        let executor = Arc::clone(self.executor);
        let semaphore = Arc::clone(self.semaphore);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => executor(idx, node).await,
                Err(e) => Err(anyhow::anyhow!("worker pool closed: {}", e)),
            };
            let (status, outputs) = match outcome {
                Ok(outputs) => (NodeStatus::Succeeded, outputs),
                Err(e) => (NodeStatus::Failed(format!("{:#}", e)), None),
            };
            let _ = tx
                .send(NodeResult {
                    node_index: idx,
                    address,
                    status,
                    outputs,
                })
                .await;
        });
    }
}

/// Event-driven DAG walker that executes nodes as their dependencies are satisfied.
///
/// At most `max_parallelism` executors run at once. A failed node skips
/// all of its transitive dependents; independent branches keep going.
pub struct DagWalker {
    max_parallelism: usize,
    progress: HashMap<NodeIndex, Progress>,
}

impl DagWalker {
    pub fn new(max_parallelism: usize) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
            progress: HashMap::new(),
        }
    }

    /// Override how individual nodes are announced.
    pub fn with_progress(mut self, progress: HashMap<NodeIndex, Progress>) -> Self {
        self.progress = progress;
        self
    }

    fn progress_for(&self, idx: NodeIndex, node: &DagNode, mode: WalkMode) -> Progress {
        if let Some(p) = self.progress.get(&idx) {
            return *p;
        }
        match (mode, node) {
            (_, DagNode::Provider { .. }) => Progress::Connecting,
            (WalkMode::Apply, _) => Progress::Creating,
            (WalkMode::Destroy, _) => Progress::Destroying,
        }
    }

    /// Walk the DAG, executing nodes via the provided executor function.
    ///
    /// Returns one result per node: executed nodes in completion order,
    /// skipped nodes right before the failure that caused them.
    pub async fn walk(
        &self,
        graph: &ResourceGraph,
        executor: Arc<NodeExecutor>,
        mode: WalkMode,
    ) -> Result<Vec<NodeResult>> {
        if graph.node_count() == 0 {
            return Ok(Vec::new());
        }

        let verbs: HashMap<NodeIndex, Verbs> = graph
            .node_indices()
            .map(|idx| (idx, self.progress_for(idx, &graph[idx], mode).verbs()))
            .collect();
        let announced = |idx: NodeIndex| !graph[idx].is_provider() && verbs[&idx].is_some();

        // Only announced resources count toward the [n/m] progress display
        let total = graph.node_indices().filter(|&idx| announced(idx)).count();
        let mut finished = 0;

        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let in_flight: Arc<DashMap<NodeIndex, InFlight>> = Arc::new(DashMap::new());
        let (tx, mut rx) = mpsc::channel::<NodeResult>(graph.node_count());
        let heartbeat_handle = tokio::spawn(heartbeat(Arc::clone(&in_flight)));

        let launcher = Launcher {
            graph,
            executor: &executor,
            semaphore: &semaphore,
            in_flight: &in_flight,
            tx: &tx,
            verbs: &verbs,
        };
        let mut schedule = Schedule::new(graph);
        let mut running = 0usize;

        for idx in schedule.roots() {
            schedule.start(idx);
            launcher.launch(idx);
            running += 1;
        }

        let mut results: Vec<NodeResult> = Vec::with_capacity(graph.node_count());

        while running > 0 {
            let Some(result) = rx.recv().await else {
                break;
            };
            running -= 1;

            let idx = result.node_index;
            let elapsed_secs = in_flight
                .remove(&idx)
                .map(|(_, node)| node.started.elapsed().as_secs())
                .unwrap_or(0);
            if announced(idx) {
                finished += 1;
            }

            match &result.status {
                NodeStatus::Succeeded => {
                    if let Some((_, done)) = verbs[&idx].filter(|_| announced(idx)) {
                        let name_suffix = result
                            .outputs
                            .as_ref()
                            .and_then(|o| o.get("name"))
                            .and_then(|v| v.as_str())
                            .map(|name| format!(" [name={}]", name))
                            .unwrap_or_default();
                        println!(
                            "{}: {} after {} [{}/{}]{}",
                            result.address,
                            format!("{} complete", done).green().bold(),
                            format_duration(elapsed_secs).bold(),
                            finished,
                            total,
                            name_suffix,
                        );
                    }
                    for next in schedule.succeed(idx) {
                        schedule.start(next);
                        launcher.launch(next);
                        running += 1;
                    }
                }
                status => {
                    if let NodeStatus::Failed(err) = status {
                        println!(
                            "{}: {} after {}: {}",
                            result.address.bold(),
                            "FAILED".red().bold(),
                            format_duration(elapsed_secs),
                            err.red(),
                        );
                    }
                    let reason = format!("Dependency '{}' failed", result.address);
                    for skipped in schedule.fail(idx, status.clone(), &reason) {
                        let address = graph[skipped].address().to_string();
                        if announced(skipped) {
                            finished += 1;
                            println!("{}: {}: {}", address.bold(), "Skipped".yellow(), reason.dimmed());
                        }
                        results.push(NodeResult {
                            node_index: skipped,
                            address,
                            status: NodeStatus::Skipped(reason.clone()),
                            outputs: None,
                        });
                    }
                }
            }

            debug!(
                address = %result.address,
                status = ?result.status,
                elapsed_secs = elapsed_secs,
                running = running,
                "Node completed"
            );
            results.push(result);
        }

        heartbeat_handle.abort();
        Ok(results)
    }
}

/// Print "Still creating... [10s elapsed]" for long-running nodes.
async fn heartbeat(in_flight: Arc<DashMap<NodeIndex, InFlight>>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        for entry in in_flight.iter() {
            let node = entry.value();
            let Some((doing, _)) = node.verbs else {
                continue;
            };
            let elapsed = node.started.elapsed().as_secs();
            if elapsed >= HEARTBEAT_INTERVAL.as_secs() {
                println!(
                    "{}: Still {}... [{} elapsed]",
                    node.address,
                    doing.to_lowercase().cyan(),
                    format_duration(elapsed).bold(),
                );
            }
        }
    }
}

/// Format seconds as `42s`, `3m` or `3m5s`.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        return format!("{}s", secs);
    }
    match secs % 60 {
        0 => format!("{}m", secs / 60),
        rest => format!("{}m{}s", secs / 60, rest),
    }
}
