// src/session/signals.rs
//
// Violation detectors. Each source looks at raw browser events on its own and
// reports through the same `Detection` shape; none of them know about warning
// counts or the session phase.

use std::{fmt, time::Duration};

use crate::config::{DEVTOOLS_GAP_PX, FRAME_STALL_MS, OVERLAY_FADE_AFTER_MS, OVERLAY_REMOVE_AFTER_MS};

/// Machine-readable violation code, rendered as e.g. `TAB_CHANGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationCode {
    Copy,
    Cut,
    Paste,
    ContextMenu,
    F12,
    CtrlShiftI,
    /// Ctrl/Cmd + the given (upper-case) key.
    Shortcut(char),
    Screenshot,
    MacScreenshot,
    SnipTool,
    TabChange,
    TabSwitch,
    WindowBlur,
    Print,
    DevtoolsOpen,
    LowFpsCapture,
    AltTab,
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationCode::Copy => f.write_str("COPY"),
            ViolationCode::Cut => f.write_str("CUT"),
            ViolationCode::Paste => f.write_str("PASTE"),
            ViolationCode::ContextMenu => f.write_str("CONTEXT_MENU"),
            ViolationCode::F12 => f.write_str("F12"),
            ViolationCode::CtrlShiftI => f.write_str("CTRL_SHIFT_I"),
            ViolationCode::Shortcut(key) => write!(f, "SHORTCUT_{}", key),
            ViolationCode::Screenshot => f.write_str("SCREENSHOT"),
            ViolationCode::MacScreenshot => f.write_str("MAC_SCREENSHOT"),
            ViolationCode::SnipTool => f.write_str("SNIP_TOOL"),
            ViolationCode::TabChange => f.write_str("TAB_CHANGE"),
            ViolationCode::TabSwitch => f.write_str("TAB_SWITCH"),
            ViolationCode::WindowBlur => f.write_str("WINDOW_BLUR"),
            ViolationCode::Print => f.write_str("PRINT"),
            ViolationCode::DevtoolsOpen => f.write_str("DEVTOOLS_OPEN"),
            ViolationCode::LowFpsCapture => f.write_str("LOW_FPS_CAPTURE"),
            ViolationCode::AltTab => f.write_str("ALT_TAB"),
        }
    }
}

/// A suspected violation: human-readable reason plus code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub reason: String,
    pub code: ViolationCode,
}

impl Violation {
    pub fn new(reason: impl Into<String>, code: ViolationCode) -> Self {
        Self {
            reason: reason.into(),
            code,
        }
    }
}

/// Timing of the transient obfuscation overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPlan {
    /// Fully opaque until this point, then fades.
    pub fade_after: Duration,
    /// Removed (and the temporary blur lifted) at this point.
    pub remove_after: Duration,
}

impl Default for OverlayPlan {
    fn default() -> Self {
        Self {
            fade_after: Duration::from_millis(OVERLAY_FADE_AFTER_MS),
            remove_after: Duration::from_millis(OVERLAY_REMOVE_AFTER_MS),
        }
    }
}

/// Cosmetic deterrence applied by the view, independent of warning counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countermeasure {
    /// Cancel the browser's default action for the event.
    PreventDefault,
    Overlay(OverlayPlan),
    /// Blur the page until focus returns.
    PersistentBlur,
    ClearBlur,
    /// Modal telling the student printing is blocked.
    PrintNotice,
}

/// What a source concluded about one event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    pub violation: Option<Violation>,
    pub countermeasures: Vec<Countermeasure>,
}

impl Detection {
    fn flag(reason: &str, code: ViolationCode, countermeasures: &[Countermeasure]) -> Self {
        Self {
            violation: Some(Violation::new(reason, code)),
            countermeasures: countermeasures.to_vec(),
        }
    }

    fn quiet(countermeasures: &[Countermeasure]) -> Self {
        Self {
            violation: None,
            countermeasures: countermeasures.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// A key event with its modifier state. `key` follows `KeyboardEvent.key`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyStroke {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyStroke {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }
}

/// Outer vs inner window dimensions, sampled periodically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSample {
    pub outer_width: i32,
    pub inner_width: i32,
    pub outer_height: i32,
    pub inner_height: i32,
}

/// Raw browser events the detectors listen to.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    Clipboard(ClipboardAction),
    ContextMenu,
    KeyDown(KeyStroke),
    KeyUp(KeyStroke),
    VisibilityChange { hidden: bool },
    WindowBlur,
    WindowFocus,
    BeforePrint,
    Viewport(ViewportSample),
    /// `requestAnimationFrame` callback at `timestamp_ms`.
    AnimationFrame { timestamp_ms: f64, hidden: bool },
}

/// An independent violation detector.
pub trait SignalSource: Send {
    fn name(&self) -> &'static str;

    /// Inspects one event. Most sources yield zero or one detection; a single
    /// keystroke may match several rules.
    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection>;
}

pub struct ClipboardGuard;

impl SignalSource for ClipboardGuard {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        let BrowserEvent::Clipboard(action) = event else {
            return Vec::new();
        };
        let (reason, code) = match action {
            ClipboardAction::Copy => ("Attempted copy", ViolationCode::Copy),
            ClipboardAction::Cut => ("Attempted cut", ViolationCode::Cut),
            ClipboardAction::Paste => ("Attempted paste", ViolationCode::Paste),
        };
        vec![Detection::flag(reason, code, &[Countermeasure::PreventDefault])]
    }
}

pub struct ContextMenuGuard;

impl SignalSource for ContextMenuGuard {
    fn name(&self) -> &'static str {
        "context_menu"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        match event {
            BrowserEvent::ContextMenu => vec![Detection::flag(
                "Right Click Blocked",
                ViolationCode::ContextMenu,
                &[Countermeasure::PreventDefault],
            )],
            _ => Vec::new(),
        }
    }
}

/// Devtools keys, blocked Ctrl/Cmd shortcuts, Alt+Tab and PrintScreen.
pub struct KeyboardGuard;

const BLOCKED_SHORTCUTS: [char; 8] = ['c', 'v', 'x', 's', 'u', 'p', 'a', 'i'];

impl SignalSource for KeyboardGuard {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        let BrowserEvent::KeyDown(stroke) = event else {
            return Vec::new();
        };
        let overlay = Countermeasure::Overlay(OverlayPlan::default());

        if stroke.key == "F12" {
            return vec![Detection::flag(
                "DevTools Attempt",
                ViolationCode::F12,
                &[Countermeasure::PreventDefault, overlay],
            )];
        }

        let key = stroke.key.to_lowercase();
        let mut detections = Vec::new();

        if stroke.ctrl || stroke.meta {
            if let Some(letter) = single_char(&key).filter(|c| BLOCKED_SHORTCUTS.contains(c)) {
                let upper = letter.to_ascii_uppercase();
                let modifier = if stroke.meta { "CMD" } else { "CTRL" };
                detections.push(Detection::flag(
                    &format!("Blocked Shortcut {}+{}", modifier, upper),
                    ViolationCode::Shortcut(upper),
                    &[Countermeasure::PreventDefault],
                ));
            }
            if stroke.shift && key == "i" {
                detections.push(Detection::flag(
                    "DevTools (Ctrl/Cmd+Shift+I)",
                    ViolationCode::CtrlShiftI,
                    &[Countermeasure::PreventDefault, overlay],
                ));
            }
        }

        // Cannot be intercepted, only reported.
        if stroke.alt && key == "tab" {
            detections.push(Detection::flag("App Switch (Alt+Tab)", ViolationCode::AltTab, &[]));
        }

        if stroke.key == "PrintScreen" {
            detections.push(Detection::flag(
                "Screenshot Attempt Detected (PrintScreen)",
                ViolationCode::Screenshot,
                &[Countermeasure::PreventDefault, overlay],
            ));
        }

        detections
    }
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Cmd+Shift+3/4/5 on macOS.
pub struct MacScreenshotGuard;

impl SignalSource for MacScreenshotGuard {
    fn name(&self) -> &'static str {
        "mac_screenshot"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        match event {
            BrowserEvent::KeyDown(stroke)
                if stroke.meta && stroke.shift && matches!(stroke.key.as_str(), "3" | "4" | "5") =>
            {
                vec![Detection::flag(
                    "Mac Screenshot Attempt Blocked",
                    ViolationCode::MacScreenshot,
                    &[
                        Countermeasure::PreventDefault,
                        Countermeasure::Overlay(OverlayPlan::default()),
                    ],
                )]
            }
            _ => Vec::new(),
        }
    }
}

/// Win+Shift+S style capture chords, seen on key release.
pub struct SnipToolGuard;

impl SignalSource for SnipToolGuard {
    fn name(&self) -> &'static str {
        "snip_tool"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        match event {
            BrowserEvent::KeyUp(stroke)
                if stroke.shift
                    && stroke.key.eq_ignore_ascii_case("s")
                    && (stroke.ctrl || stroke.meta || stroke.alt) =>
            {
                vec![Detection::flag(
                    "Snipping Tool / Screen Capture Attempt",
                    ViolationCode::SnipTool,
                    &[Countermeasure::Overlay(OverlayPlan::default())],
                )]
            }
            _ => Vec::new(),
        }
    }
}

/// Page hidden. Reports both the global `TAB_CHANGE` and the exam page's
/// own `TAB_SWITCH`; the shared cooldown collapses them into one warning.
pub struct VisibilityGuard;

impl SignalSource for VisibilityGuard {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        match event {
            BrowserEvent::VisibilityChange { hidden: true } => vec![
                Detection::flag(
                    "Tab Switch detected",
                    ViolationCode::TabChange,
                    &[Countermeasure::Overlay(OverlayPlan::default())],
                ),
                Detection::flag("Tab Switch detected", ViolationCode::TabSwitch, &[]),
            ],
            _ => Vec::new(),
        }
    }
}

pub struct FocusGuard;

impl SignalSource for FocusGuard {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        match event {
            BrowserEvent::WindowBlur => vec![Detection::flag(
                "Window focus lost",
                ViolationCode::WindowBlur,
                &[
                    Countermeasure::PersistentBlur,
                    Countermeasure::Overlay(OverlayPlan::default()),
                ],
            )],
            BrowserEvent::WindowFocus => vec![Detection::quiet(&[Countermeasure::ClearBlur])],
            _ => Vec::new(),
        }
    }
}

pub struct PrintGuard;

impl SignalSource for PrintGuard {
    fn name(&self) -> &'static str {
        "print"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        match event {
            BrowserEvent::BeforePrint => vec![Detection::flag(
                "Print Blocked",
                ViolationCode::Print,
                &[
                    Countermeasure::PreventDefault,
                    Countermeasure::PrintNotice,
                    Countermeasure::Overlay(OverlayPlan::default()),
                ],
            )],
            _ => Vec::new(),
        }
    }
}

/// Docked devtools shrink the inner viewport well below the outer window.
pub struct ViewportGuard {
    gap_px: i32,
}

impl ViewportGuard {
    pub fn new(gap_px: i32) -> Self {
        Self { gap_px }
    }
}

impl Default for ViewportGuard {
    fn default() -> Self {
        Self::new(DEVTOOLS_GAP_PX)
    }
}

impl SignalSource for ViewportGuard {
    fn name(&self) -> &'static str {
        "viewport"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        let BrowserEvent::Viewport(sample) = event else {
            return Vec::new();
        };
        let wide_gap = sample.outer_width - sample.inner_width > self.gap_px;
        let tall_gap = sample.outer_height - sample.inner_height > self.gap_px;
        if !(wide_gap || tall_gap) {
            return Vec::new();
        }
        vec![Detection::flag(
            "DevTools Detected (Size Gap)",
            ViolationCode::DevtoolsOpen,
            &[
                Countermeasure::Overlay(OverlayPlan::default()),
                Countermeasure::PersistentBlur,
            ],
        )]
    }
}

/// Long gaps between animation frames while the page is visible hint at a
/// recorder or an off-screen window. Heuristic only.
pub struct FrameTimingGuard {
    stall_ms: f64,
    last_frame: Option<f64>,
}

impl FrameTimingGuard {
    pub fn new(stall_ms: f64) -> Self {
        Self {
            stall_ms,
            last_frame: None,
        }
    }
}

impl Default for FrameTimingGuard {
    fn default() -> Self {
        Self::new(FRAME_STALL_MS)
    }
}

impl SignalSource for FrameTimingGuard {
    fn name(&self) -> &'static str {
        "frame_timing"
    }

    fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        let BrowserEvent::AnimationFrame { timestamp_ms, hidden } = *event else {
            return Vec::new();
        };
        let previous = self.last_frame.replace(timestamp_ms);
        let Some(previous) = previous else {
            return Vec::new();
        };
        if timestamp_ms - previous > self.stall_ms && !hidden {
            return vec![Detection::flag(
                "Possible screen recording / background activity detected",
                ViolationCode::LowFpsCapture,
                &[Countermeasure::Overlay(OverlayPlan::default())],
            )];
        }
        Vec::new()
    }
}

/// Fan-out of one browser event to every registered source, in registration order.
pub struct SignalHub {
    sources: Vec<Box<dyn SignalSource>>,
}

impl SignalHub {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Every built-in detector with the given heuristic thresholds.
    pub fn standard(devtools_gap_px: i32, frame_stall_ms: f64) -> Self {
        Self::empty()
            .with_source(Box::new(ClipboardGuard))
            .with_source(Box::new(ContextMenuGuard))
            .with_source(Box::new(KeyboardGuard))
            .with_source(Box::new(MacScreenshotGuard))
            .with_source(Box::new(SnipToolGuard))
            .with_source(Box::new(VisibilityGuard))
            .with_source(Box::new(FocusGuard))
            .with_source(Box::new(PrintGuard))
            .with_source(Box::new(ViewportGuard::new(devtools_gap_px)))
            .with_source(Box::new(FrameTimingGuard::new(frame_stall_ms)))
    }

    pub fn with_source(mut self, source: Box<dyn SignalSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Drops a source by name. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.name() != name);
        before != self.sources.len()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn observe(&mut self, event: &BrowserEvent) -> Vec<Detection> {
        self.sources
            .iter_mut()
            .flat_map(|source| source.observe(event))
            .collect()
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::standard(DEVTOOLS_GAP_PX, FRAME_STALL_MS)
    }
}
