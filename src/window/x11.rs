use std::collections::HashSet;

use anyhow::{Context, Result};

use super::{scan_owned, search_by_title, NativeWindow, RawWindow, WindowBackend, WindowHandle, WindowScan};
use crate::target::TargetProfile;
use crate::utils::command::stdout_of;
use crate::log_debug;

const ENABLE_LOGS: bool = true;

/// X11 windows through `wmctrl`, with `xdotool` as the title-search fallback.
pub struct X11Windows;

fn next_field(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    let end = line.find(char::is_whitespace).unwrap_or(line.len());
    if end == 0 {
        return None;
    }
    Some((&line[..end], &line[end..]))
}

/// One line of `wmctrl -lp`: `<id> <desktop> <pid> <host> <title>`.
pub(crate) fn parse_wmctrl_line(line: &str) -> Option<RawWindow> {
    let (id, rest) = next_field(line)?;
    let (_desktop, rest) = next_field(rest)?;
    let (pid, rest) = next_field(rest)?;
    let (_host, rest) = next_field(rest)?;

    let id = u64::from_str_radix(id.trim_start_matches("0x"), 16).ok()?;
    let pid = pid.parse::<u32>().ok().filter(|pid| *pid != 0);

    Some(RawWindow {
        native: NativeWindow::X11 { id },
        pid,
        title: rest.trim().to_string(),
    })
}

fn wmctrl_windows() -> Result<Vec<RawWindow>> {
    let listing = stdout_of("wmctrl", &["-lp"])?;
    Ok(listing.lines().filter_map(parse_wmctrl_line).collect())
}

fn xdotool_title(id: u64) -> Result<RawWindow> {
    let title = stdout_of("xdotool", &["getwindowname", &id.to_string()])?;
    Ok(RawWindow {
        native: NativeWindow::X11 { id },
        pid: None,
        title,
    })
}

fn xdotool_candidates(display_name: &str) -> Result<Vec<u64>> {
    let listing = stdout_of("xdotool", &["search", "--name", display_name])?;
    listing
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim()
                .parse::<u64>()
                .with_context(|| format!("unexpected xdotool window id {line:?}"))
        })
        .collect()
}

impl WindowBackend for X11Windows {
    fn scan_owned(&mut self, pids: &HashSet<u32>, profile: &TargetProfile) -> Option<WindowScan> {
        match wmctrl_windows() {
            Ok(windows) => Some(scan_owned(windows.into_iter().map(Ok), pids, profile)),
            Err(err) => {
                log_debug!("wmctrl unavailable: {err:#}");
                None
            }
        }
    }

    fn search_by_title(&mut self, profile: &TargetProfile) -> Option<WindowHandle> {
        let ids = match xdotool_candidates(&profile.display_name) {
            Ok(ids) => ids,
            Err(err) => {
                log_debug!("xdotool search failed: {err:#}");
                return None;
            }
        };
        search_by_title(ids.into_iter().map(xdotool_title), profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wmctrl_listing() {
        let raw = parse_wmctrl_line("0x04400003  0 41230  laptop Daft Punk - One More Time")
            .expect("parsed");
        assert_eq!(raw.native, NativeWindow::X11 { id: 0x0440_0003 });
        assert_eq!(raw.pid, Some(41230));
        assert_eq!(raw.title, "Daft Punk - One More Time");
    }

    #[test]
    fn window_without_title_or_pid() {
        let raw = parse_wmctrl_line("0x01e00001 -1 0      N/A ").expect("parsed");
        assert_eq!(raw.pid, None);
        assert!(raw.title.is_empty());
    }

    #[test]
    fn garbage_lines_are_skipped() {
        assert!(parse_wmctrl_line("").is_none());
        assert!(parse_wmctrl_line("not-hex 0 12 host Title").is_none());
        assert!(parse_wmctrl_line("0x01 0").is_none());
    }
}
