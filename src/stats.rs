//! Statistics collection and export.
//!
//! [`SimulationStats`] aggregates what a run did: how many ticks committed,
//! how much work the scheduler performed, the size of the network and the
//! wall-clock cost. It exports to JSON, CSV, or a human-readable summary.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::executor::TickExecutorStats;
use crate::network::Network;

/// Aggregate statistics for a simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Simulation metadata
    pub metadata: SimulationMetadata,

    /// Network size
    pub network: NetworkStats,

    /// Scheduler work
    pub scheduler: SchedulerStats,

    /// Timing statistics
    pub timing: TimingStats,
}

/// Metadata about the simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationMetadata {
    /// Simulation name/description
    pub name: String,

    /// Start time (wall clock)
    pub start_time: Option<String>,

    /// End time (wall clock)
    pub end_time: Option<String>,

    /// Crate version
    pub version: String,

    /// Why the run ended
    pub stop_reason: Option<String>,
}

/// Size of the simulated network.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub process_count: usize,
    pub combinational_count: usize,
    pub sequential_count: usize,
    pub bus_count: usize,
    pub edge_count: usize,
    pub same_tick_edge_count: usize,
}

impl NetworkStats {
    pub fn from_network(network: &Network) -> Self {
        let combinational_count = network.processes().filter(|p| p.is_combinational()).count();
        Self {
            process_count: network.process_count(),
            combinational_count,
            sequential_count: network.process_count() - combinational_count,
            bus_count: network.bus_count(),
            edge_count: network.graph().edges().len(),
            same_tick_edge_count: network.graph().same_tick_edges().count(),
        }
    }
}

/// Work performed by the scheduler.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Ticks committed
    pub ticks_executed: u64,

    /// Combinational step calls
    pub comb_invocations: u64,

    /// Sequential resumes
    pub seq_resumes: u64,

    /// Stabilization passes over all ticks
    pub passes: u64,

    /// Most passes in a single tick
    pub max_passes: usize,

    /// External writes applied
    pub drives_applied: u64,
}

impl From<&TickExecutorStats> for SchedulerStats {
    fn from(stats: &TickExecutorStats) -> Self {
        Self {
            ticks_executed: stats.ticks_executed,
            comb_invocations: stats.comb_invocations,
            seq_resumes: stats.seq_resumes,
            passes: stats.passes,
            max_passes: stats.max_passes,
            drives_applied: stats.drives_applied,
        }
    }
}

/// Timing/performance statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingStats {
    /// Total wall-clock time in milliseconds
    pub total_wall_time_ms: f64,

    /// Ticks executed per second
    pub ticks_per_second: f64,

    /// Process invocations per second
    pub invocations_per_second: f64,
}

impl SimulationStats {
    /// Creates a new empty statistics container.
    pub fn new() -> Self {
        Self {
            metadata: SimulationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..SimulationMetadata::default()
            },
            ..Self::default()
        }
    }

    /// Sets the simulation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Records the start time.
    pub fn record_start(&mut self) {
        self.metadata.start_time = Some(timestamp());
    }

    /// Records the end time.
    pub fn record_end(&mut self) {
        self.metadata.end_time = Some(timestamp());
    }

    /// Updates timing statistics based on wall clock time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;

        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            let invocations = self.scheduler.comb_invocations + self.scheduler.seq_resumes;
            self.timing.ticks_per_second = self.scheduler.ticks_executed as f64 / seconds;
            self.timing.invocations_per_second = invocations as f64 / seconds;
        }
    }

    /// Average stabilization passes per tick.
    pub fn average_passes(&self) -> f64 {
        if self.scheduler.ticks_executed == 0 {
            0.0
        } else {
            self.scheduler.passes as f64 / self.scheduler.ticks_executed as f64
        }
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("metric,value\n");

        // Network
        csv.push_str(&format!("process_count,{}\n", self.network.process_count));
        csv.push_str(&format!("combinational_count,{}\n", self.network.combinational_count));
        csv.push_str(&format!("sequential_count,{}\n", self.network.sequential_count));
        csv.push_str(&format!("bus_count,{}\n", self.network.bus_count));
        csv.push_str(&format!("edge_count,{}\n", self.network.edge_count));

        // Scheduler
        csv.push_str(&format!("ticks_executed,{}\n", self.scheduler.ticks_executed));
        csv.push_str(&format!("comb_invocations,{}\n", self.scheduler.comb_invocations));
        csv.push_str(&format!("seq_resumes,{}\n", self.scheduler.seq_resumes));
        csv.push_str(&format!("passes,{}\n", self.scheduler.passes));
        csv.push_str(&format!("max_passes,{}\n", self.scheduler.max_passes));
        csv.push_str(&format!("drives_applied,{}\n", self.scheduler.drives_applied));

        // Timing
        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.timing.total_wall_time_ms));
        csv.push_str(&format!("ticks_per_second,{:.2}\n", self.timing.ticks_per_second));

        csv
    }

    /// Exports summary statistics to CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Statistics ===")?;
        writeln!(w)?;

        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        if let Some(ref start) = self.metadata.start_time {
            writeln!(w, "Started: {}", start)?;
        }
        if let Some(ref end) = self.metadata.end_time {
            writeln!(w, "Ended: {}", end)?;
        }
        if let Some(ref reason) = self.metadata.stop_reason {
            writeln!(w, "Stopped: {}", reason)?;
        }
        writeln!(w)?;

        writeln!(w, "--- Network ---")?;
        writeln!(
            w,
            "Processes: {} ({} combinational, {} sequential)",
            self.network.process_count,
            self.network.combinational_count,
            self.network.sequential_count
        )?;
        writeln!(w, "Buses: {}", self.network.bus_count)?;
        writeln!(
            w,
            "Edges: {} ({} same-tick)",
            self.network.edge_count, self.network.same_tick_edge_count
        )?;
        writeln!(w)?;

        writeln!(w, "--- Scheduler ---")?;
        writeln!(w, "Ticks executed: {}", self.scheduler.ticks_executed)?;
        writeln!(w, "Combinational steps: {}", self.scheduler.comb_invocations)?;
        writeln!(w, "Sequential resumes: {}", self.scheduler.seq_resumes)?;
        writeln!(
            w,
            "Passes: {} (avg {:.2}, max {})",
            self.scheduler.passes,
            self.average_passes(),
            self.scheduler.max_passes
        )?;
        writeln!(w, "External drives: {}", self.scheduler.drives_applied)?;
        writeln!(w)?;

        writeln!(w, "--- Timing ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;
        writeln!(w, "Ticks/sec: {:.2}", self.timing.ticks_per_second)?;

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

/// Seconds since the Unix epoch.
fn timestamp() -> String {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    format!("{}s", duration.as_secs())
}
