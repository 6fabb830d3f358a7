use std::collections::HashSet;

use anyhow::Result;

use super::{scan_owned, search_by_title, NativeWindow, RawWindow, WindowBackend, WindowHandle, WindowScan};
use crate::target::TargetProfile;
use crate::utils::command::{applescript_string, osascript};

/// Window titles through System Events. There is no cheap liveness probe, so
/// cached handles are trusted inside the resolver's staleness window.
pub struct AppleScriptWindows;

fn titles_script(selector: &str) -> String {
    format!(
        "tell application \"System Events\"\n\
         set matches to every process whose {selector}\n\
         if matches is {{}} then return \"\"\n\
         set AppleScript's text item delimiters to linefeed\n\
         return (name of every window of (item 1 of matches)) as text\n\
         end tell"
    )
}

fn windows_of(pid: u32, selector: &str) -> Result<Vec<RawWindow>> {
    let output = osascript(&titles_script(selector))?;
    Ok(output
        .lines()
        .enumerate()
        .map(|(index, title)| RawWindow {
            native: NativeWindow::AppleScript { pid, index },
            pid: Some(pid),
            title: title.to_string(),
        })
        .collect())
}

/// One osascript call per pid, flattened into a single lazy walk.
fn owned_walk(pids: &HashSet<u32>) -> impl Iterator<Item = Result<RawWindow>> + '_ {
    pids.iter().flat_map(|pid| {
        let batch: Vec<Result<RawWindow>> = match windows_of(*pid, &format!("unix id is {pid}")) {
            Ok(windows) => windows.into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        };
        batch
    })
}

impl WindowBackend for AppleScriptWindows {
    fn scan_owned(&mut self, pids: &HashSet<u32>, profile: &TargetProfile) -> Option<WindowScan> {
        Some(scan_owned(owned_walk(pids), pids, profile))
    }

    fn search_by_title(&mut self, profile: &TargetProfile) -> Option<WindowHandle> {
        let selector = format!("name is {}", applescript_string(&profile.display_name));
        let windows = windows_of(0, &selector).ok()?;
        search_by_title(windows.into_iter().map(Ok), profile)
    }
}
