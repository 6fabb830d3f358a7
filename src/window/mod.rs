//! Finds the target's window and reads its title.
//!
//! Discovery runs a pid-scoped walk first and only falls back to a looser
//! title search when that walk fails or the platform cannot map pids to
//! windows. Results are cached for a short staleness window.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(windows)]
mod win32;
#[cfg(all(unix, not(target_os = "macos")))]
mod x11;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::target::TargetProfile;
use crate::log_debug;

const ENABLE_LOGS: bool = true;

pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_millis(500);

const HELPER_MARKERS: &[&str] = &["helper", "crashpad", "msctfime"];

const UNRELATED_MARKERS: &[&str] = &[
    "file explorer",
    "explorer",
    "cursor",
    "vscode",
    "chrome",
    "firefox",
    "edge",
    "safari",
    ".py",
    ".js",
    ".html",
    ".txt",
    ".md",
    "c:\\",
    "ideaprojects",
    "github",
    "git",
    "folder",
    "directory",
];

const PATH_MARKERS: &[&str] = &["\\", "/", "file", "folder", "directory", "explorer", ".exe"];

const DEV_MARKERS: &[&str] = &["cursor", "vscode", "ide", "browser", "tab"];

/// OS reference to a window. Only the resolver and its backends look inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeWindow {
    Win32 { hwnd: isize },
    AppleScript { pid: u32, index: usize },
    X11 { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    OwnedByPid,
    TitleSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowHandle {
    pub title: String,
    pub strategy: Strategy,
    native: NativeWindow,
}

impl WindowHandle {
    pub(crate) fn new(title: String, native: NativeWindow, strategy: Strategy) -> Self {
        Self {
            title,
            strategy,
            native,
        }
    }
}

/// One window as a backend reports it, before any filtering.
#[derive(Debug, Clone)]
pub(crate) struct RawWindow {
    pub native: NativeWindow,
    pub pid: Option<u32>,
    pub title: String,
}

/// Two-slot accumulator produced by a pid-scoped walk.
#[derive(Debug, Default)]
pub struct WindowScan {
    pub best: Option<WindowHandle>,
    pub fallback: Option<WindowHandle>,
    pub examined: usize,
    /// The walk stopped on an error; slots hold whatever was seen before it.
    pub aborted: bool,
}

impl WindowScan {
    pub fn into_handle(self) -> Option<WindowHandle> {
        self.best.or(self.fallback)
    }

    fn is_empty(&self) -> bool {
        self.best.is_none() && self.fallback.is_none()
    }
}

pub trait WindowBackend {
    /// Walk windows owned by `pids`. `None` when the platform call failed
    /// outright or there is no pid-to-window API.
    fn scan_owned(&mut self, pids: &HashSet<u32>, profile: &TargetProfile) -> Option<WindowScan>;

    /// Loose search by title, used only when `scan_owned` gives nothing usable.
    fn search_by_title(&mut self, profile: &TargetProfile) -> Option<WindowHandle>;

    /// Whether a cached reference still resolves. Backends without a cheap
    /// check trust the cache for the short staleness window.
    fn is_alive(&mut self, _native: &NativeWindow) -> bool {
        true
    }
}

fn is_helper_title(folded: &str) -> bool {
    HELPER_MARKERS.iter().any(|marker| folded.contains(marker))
}

fn has_track_separator(title: &str) -> bool {
    title.contains(" - ") || title.contains(" – ")
}

/// "Artist - Track" or one of the idle titles.
pub(crate) fn is_preferred_title(title: &str, profile: &TargetProfile) -> bool {
    has_track_separator(title) || profile.is_idle_title(title)
}

/// Bounded walk over `windows`, keeping the first preferred window (and
/// stopping there) plus the first acceptable one as a fallback.
pub(crate) fn scan_owned<I>(windows: I, pids: &HashSet<u32>, profile: &TargetProfile) -> WindowScan
where
    I: IntoIterator<Item = Result<RawWindow>>,
{
    let mut scan = WindowScan::default();

    for item in windows {
        let raw = match item {
            Ok(raw) => raw,
            Err(err) => {
                log_debug!("window walk aborted: {err:#}");
                scan.aborted = true;
                break;
            }
        };

        if !raw.pid.map_or(false, |pid| pids.contains(&pid)) {
            continue;
        }

        let title = raw.title.trim();
        if title.is_empty() || is_helper_title(&title.to_lowercase()) {
            continue;
        }
        scan.examined += 1;

        let preferred = is_preferred_title(title, profile);
        let handle = WindowHandle::new(raw.title, raw.native, Strategy::OwnedByPid);
        if preferred {
            scan.best = Some(handle);
            break;
        }
        if scan.fallback.is_none() {
            scan.fallback = Some(handle);
        }
    }

    scan
}

/// Title-only matching for the fallback path. Rejects titles that look like
/// other applications, file paths or executables.
pub(crate) fn accept_by_title(title: &str, profile: &TargetProfile) -> bool {
    let title = title.trim();
    if title.is_empty() {
        return false;
    }

    let folded = title.to_lowercase();
    if !profile.mentions_app(&folded) {
        return false;
    }
    if UNRELATED_MARKERS.iter().any(|marker| folded.contains(marker)) {
        return false;
    }
    if profile.is_idle_title(title) {
        return true;
    }

    title.contains(" - ")
        && !PATH_MARKERS.iter().any(|marker| folded.contains(marker))
        && !DEV_MARKERS.iter().any(|marker| folded.contains(marker))
}

pub(crate) fn search_by_title<I>(windows: I, profile: &TargetProfile) -> Option<WindowHandle>
where
    I: IntoIterator<Item = Result<RawWindow>>,
{
    windows
        .into_iter()
        .map_while(|item| item.ok())
        .find(|raw| accept_by_title(&raw.title, profile))
        .map(|raw| WindowHandle::new(raw.title, raw.native, Strategy::TitleSearch))
}

struct CachedWindow {
    handle: WindowHandle,
    checked_at: Instant,
}

pub struct WindowResolver {
    backend: Box<dyn WindowBackend>,
    profile: TargetProfile,
    cached: Option<CachedWindow>,
    revalidate_after: Duration,
}

impl WindowResolver {
    pub fn new(backend: Box<dyn WindowBackend>, profile: TargetProfile, revalidate_after: Duration) -> Self {
        Self {
            backend,
            profile,
            cached: None,
            revalidate_after,
        }
    }

    /// Best window for `pids`, or `None` when the target has no suitable
    /// window. A returned handle may still carry an empty title.
    pub fn resolve_window(&mut self, pids: &HashSet<u32>) -> Option<WindowHandle> {
        self.resolve_window_at(pids, Instant::now())
    }

    pub(crate) fn resolve_window_at(&mut self, pids: &HashSet<u32>, now: Instant) -> Option<WindowHandle> {
        if pids.is_empty() {
            self.cached = None;
            return None;
        }

        if let Some(cached) = &self.cached {
            let fresh = now.duration_since(cached.checked_at) < self.revalidate_after;
            if fresh {
                if self.backend.is_alive(&cached.handle.native) {
                    return Some(cached.handle.clone());
                }
                log_debug!("cached window no longer resolves; rediscovering");
            }
            self.cached = None;
        }

        let found = self.discover(pids);
        if let Some(handle) = &found {
            self.cached = Some(CachedWindow {
                handle: handle.clone(),
                checked_at: now,
            });
        }
        found
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    fn discover(&mut self, pids: &HashSet<u32>) -> Option<WindowHandle> {
        match self.backend.scan_owned(pids, &self.profile) {
            Some(scan) if !(scan.aborted && scan.is_empty()) => {
                log_debug!(
                    "pid-scoped window walk examined {} window(s)",
                    scan.examined
                );
                scan.into_handle()
            }
            _ => {
                let found = self.backend.search_by_title(&self.profile);
                if found.is_some() {
                    log_debug!("window found by title search");
                }
                found
            }
        }
    }
}

/// A backend that never finds anything, for platforms without window APIs.
pub struct NoWindows;

impl WindowBackend for NoWindows {
    fn scan_owned(&mut self, _pids: &HashSet<u32>, _profile: &TargetProfile) -> Option<WindowScan> {
        None
    }

    fn search_by_title(&mut self, _profile: &TargetProfile) -> Option<WindowHandle> {
        None
    }
}

/// Window backend for the current OS.
pub fn platform_backend() -> Box<dyn WindowBackend> {
    #[cfg(windows)]
    {
        Box::new(win32::Win32Windows::new())
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(macos::AppleScriptWindows)
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Box::new(x11::X11Windows)
    }

    #[cfg(not(any(windows, unix)))]
    {
        crate::log_warn!("window detection is not supported on this platform");
        Box::new(NoWindows)
    }
}
