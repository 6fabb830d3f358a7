use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::target::TargetProfile;
use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = true;

pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: u32,
    pub matched_name: String,
}

/// Where process information comes from. Swappable so the cache logic can be
/// exercised without a live process table.
pub trait ProcessSource {
    /// Current name of `pid`, or `None` if the process is gone.
    fn name_of(&mut self, pid: u32) -> Option<String>;

    /// Every process visible to us.
    fn scan(&mut self) -> Result<Vec<ProcessHandle>>;
}

/// Finds the target's process ids, re-validating a small cache instead of
/// enumerating the whole process table on every tick.
pub struct ProcessLocator {
    source: Box<dyn ProcessSource>,
    profile: TargetProfile,
    cached: Vec<ProcessHandle>,
    rescan_interval: Duration,
    last_scan: Option<Instant>,
}

impl ProcessLocator {
    pub fn new(source: Box<dyn ProcessSource>, profile: TargetProfile, rescan_interval: Duration) -> Self {
        Self {
            source,
            profile,
            cached: Vec::new(),
            rescan_interval,
            last_scan: None,
        }
    }

    pub fn find_target_pids(&mut self) -> HashSet<u32> {
        self.find_target_pids_at(Instant::now())
    }

    pub(crate) fn find_target_pids_at(&mut self, now: Instant) -> HashSet<u32> {
        if !self.cached.is_empty() {
            self.verify_cached();
            if !self.cached.is_empty() {
                return self.cached_pids();
            }
            // Everything we knew about died; look again right away.
            self.last_scan = None;
        }

        let scan_due = self
            .last_scan
            .map_or(true, |at| now.duration_since(at) >= self.rescan_interval);
        if !scan_due {
            return HashSet::new();
        }

        self.full_scan(now)
    }

    /// Forget cached pids; the next call performs a full scan.
    pub fn invalidate(&mut self) {
        self.cached.clear();
        self.last_scan = None;
    }

    fn verify_cached(&mut self) {
        let before = self.cached.len();
        let source = &mut self.source;
        let profile = &self.profile;
        self.cached.retain(|handle| match source.name_of(handle.pid) {
            Some(name) => profile.matches_process(&name),
            None => false,
        });

        let dropped = before - self.cached.len();
        if dropped > 0 {
            log_debug!("dropped {} dead target pid(s) from cache", dropped);
        }
    }

    fn full_scan(&mut self, now: Instant) -> HashSet<u32> {
        self.last_scan = Some(now);

        match self.source.scan() {
            Ok(processes) => {
                self.cached = processes
                    .into_iter()
                    .filter(|handle| self.profile.matches_process(&handle.matched_name))
                    .collect();
                if !self.cached.is_empty() {
                    log_debug!("process scan found {:?}", self.cached_pids());
                }
                self.cached_pids()
            }
            Err(err) => {
                // Scans only run with an empty cache, so "nothing" is the last known truth.
                log_info!("process scan failed: {err:#}");
                HashSet::new()
            }
        }
    }

    fn cached_pids(&self) -> HashSet<u32> {
        self.cached.iter().map(|handle| handle.pid).collect()
    }
}

/// Process table backed by `sysinfo`.
pub struct SysinfoProcesses {
    system: System,
    own_pid: u32,
}

impl SysinfoProcesses {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            own_pid: std::process::id(),
        }
    }
}

impl ProcessSource for SysinfoProcesses {
    fn name_of(&mut self, pid: u32) -> Option<String> {
        // A fresh table guarantees a dead pid is not served from a stale entry.
        let mut probe = System::new();
        let sys_pid = Pid::from_u32(pid);
        probe.refresh_processes_specifics(ProcessesToUpdate::Some(&[sys_pid]), ProcessRefreshKind::new());
        probe
            .process(sys_pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }

    fn scan(&mut self) -> Result<Vec<ProcessHandle>> {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        Ok(self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != self.own_pid)
            .map(|(pid, process)| ProcessHandle {
                pid: pid.as_u32(),
                matched_name: process.name().to_string_lossy().into_owned(),
            })
            .collect())
    }
}
