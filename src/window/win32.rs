use std::collections::HashSet;

use anyhow::{anyhow, Result};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextW, GetWindowThreadProcessId, IsWindow, IsWindowVisible,
};

use super::{scan_owned, search_by_title, NativeWindow, RawWindow, WindowBackend, WindowHandle, WindowScan};
use crate::target::TargetProfile;

unsafe extern "system" fn collect_hwnd(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let hwnds = &mut *(lparam.0 as *mut Vec<isize>);
    hwnds.push(hwnd.0 as isize);
    TRUE
}

/// Top-level window handles, plus the error if enumeration stopped early.
fn top_level_windows() -> (Vec<isize>, Option<anyhow::Error>) {
    let mut hwnds: Vec<isize> = Vec::new();
    let result = unsafe {
        EnumWindows(
            Some(collect_hwnd),
            LPARAM(&mut hwnds as *mut Vec<isize> as isize),
        )
    };
    (hwnds, result.err().map(|err| anyhow!("EnumWindows failed: {err}")))
}

/// Visible window details, read only when the walk reaches this handle.
fn describe(raw: isize) -> Option<RawWindow> {
    let hwnd = HWND(raw as *mut _);
    unsafe {
        if !IsWindowVisible(hwnd).as_bool() {
            return None;
        }

        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));

        let mut buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut buf);
        let title = String::from_utf16_lossy(&buf[..len.max(0) as usize]);

        Some(RawWindow {
            native: NativeWindow::Win32 { hwnd: raw },
            pid: Some(pid),
            title,
        })
    }
}

fn lazy_walk() -> impl Iterator<Item = Result<RawWindow>> {
    let (hwnds, failure) = top_level_windows();
    hwnds
        .into_iter()
        .filter_map(describe)
        .map(Ok)
        .chain(failure.map(Err))
}

pub struct Win32Windows;

impl Win32Windows {
    pub fn new() -> Self {
        Self
    }
}

impl WindowBackend for Win32Windows {
    fn scan_owned(&mut self, pids: &HashSet<u32>, profile: &TargetProfile) -> Option<WindowScan> {
        let (hwnds, failure) = top_level_windows();
        if hwnds.is_empty() && failure.is_some() {
            return None;
        }

        let walk = hwnds
            .into_iter()
            .filter_map(describe)
            .map(Ok)
            .chain(failure.map(Err));
        Some(scan_owned(walk, pids, profile))
    }

    fn search_by_title(&mut self, profile: &TargetProfile) -> Option<WindowHandle> {
        search_by_title(lazy_walk(), profile)
    }

    fn is_alive(&mut self, native: &NativeWindow) -> bool {
        match native {
            NativeWindow::Win32 { hwnd } => unsafe { IsWindow(HWND(*hwnd as *mut _)).as_bool() },
            _ => false,
        }
    }
}
