//! Split-screen terminal dashboard.
//!
//! ANSI escape sequences carve the terminal into a fixed 7-line upper pane
//! (title bar, column headers, separator, three data rows, labeled
//! separator) and a scrolling lower pane for log lines. The scroll region
//! is restricted to the lower pane, so the statistics stay pinned while
//! packet logs flow underneath.
//!
//! Layout:
//!   Line 1: title bar (bold reverse video)
//!   Line 2: column headers
//!   Line 3: separator
//!   Line 4-6: TX Send / RX Proc / RX Intv data rows
//!   Line 7: separator with "Packet Log" label
//!
//! Safe to call from any thread while the workers run; every entry point
//! takes the internal mutex before touching the output stream.

use std::io::Write;

use console::Term;
use parking_lot::Mutex;

use crate::stats::LatencyReport;

/// Lines reserved for the pinned upper pane.
pub const HEADER_LINES: u16 = 7;

struct Inner {
    rows: u16,
    cols: u16,
    active: bool,
}

/// Two-pane terminal renderer.
pub struct Dashboard {
    inner: Mutex<Inner>,
}

impl Dashboard {
    /// Create an inactive dashboard; call [`init`](Self::init) to take
    /// over the terminal.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows: 24,
                cols: 80,
                active: false,
            }),
        }
    }

    /// Clear the screen, draw the empty dashboard, and restrict the
    /// scroll region to the lower pane.
    pub fn init(&self) {
        let mut inner = self.inner.lock();

        let (rows, cols) = Term::stdout().size();
        if rows > 0 && cols > 0 {
            inner.rows = rows;
            inner.cols = cols;
        }

        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\x1b[2J\x1b[H");
        draw_dashboard(
            &mut out,
            inner.cols,
            &LatencyReport::default(),
            &LatencyReport::default(),
            &LatencyReport::default(),
        );
        // Scroll region [HEADER_LINES+1, rows], cursor to its first line.
        let _ = write!(out, "\x1b[{};{}r", HEADER_LINES + 1, inner.rows);
        let _ = write!(out, "\x1b[{};1H", HEADER_LINES + 1);
        let _ = out.flush();

        inner.active = true;
    }

    /// Redraw the pinned pane with fresh statistics.
    pub fn update(&self, tx: &LatencyReport, rx: &LatencyReport, interval: &LatencyReport) {
        let inner = self.inner.lock();
        if !inner.active {
            return;
        }

        let mut out = std::io::stdout().lock();
        // Save the cursor (sitting in the scroll region), redraw, restore.
        let _ = write!(out, "\x1b[s");
        draw_dashboard(&mut out, inner.cols, tx, rx, interval);
        let _ = write!(out, "\x1b[u");
        let _ = out.flush();
    }

    /// Append a log line to the scrolling pane.
    ///
    /// Falls back to plain stdout before [`init`](Self::init).
    pub fn log(&self, msg: &str) {
        let _inner = self.inner.lock();
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{msg}");
        if !msg.ends_with('\n') {
            let _ = writeln!(out);
        }
        let _ = out.flush();
    }

    /// Restore the terminal: full scroll region, cursor at the bottom.
    ///
    /// Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if !inner.active {
            return;
        }

        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\x1b[r");
        let _ = write!(out, "\x1b[{};1H\n", inner.rows);
        let _ = out.flush();

        inner.active = false;
    }

    /// Whether the dashboard currently owns the terminal.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_dashboard(
    out: &mut impl Write,
    cols: u16,
    tx: &LatencyReport,
    rx: &LatencyReport,
    interval: &LatencyReport,
) {
    let cols = cols as usize;
    let _ = write!(out, "\x1b[H");

    // Title bar, padded to the full width in reverse video.
    let title = " UDP Latency Dashboard";
    let pad = cols.saturating_sub(title.len());
    let _ = write!(out, "\x1b[1;7m{title}{}\x1b[0m\n", " ".repeat(pad));

    // Column headers.
    let _ = write!(
        out,
        "\x1b[2m {:<8}{:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}  (us)\x1b[0m\x1b[K\n",
        "", "count", "min", "p50", "p95", "p99", "p99.9", "max"
    );

    let sep_len = cols.saturating_sub(2).clamp(10, 78);
    let _ = write!(out, "\x1b[2m {}\x1b[0m\x1b[K\n", "-".repeat(sep_len));

    draw_row(out, "TX Send", tx);
    draw_row(out, "RX Proc", rx);
    draw_row(out, "RX Intv", interval);

    // Separator carrying the log pane label; no trailing newline so the
    // pinned pane never scrolls itself.
    let left = 20usize;
    let right = cols
        .saturating_sub(left + " Packet Log  ".len() + 2)
        .clamp(4, 50);
    let _ = write!(
        out,
        "\x1b[2m {} Packet Log  {}\x1b[0m\x1b[K",
        "-".repeat(left),
        "-".repeat(right)
    );
}

fn draw_row(out: &mut impl Write, label: &str, r: &LatencyReport) {
    if r.is_empty() {
        let _ = write!(
            out,
            " {label:<8}{:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}\x1b[K\n",
            "-", "-", "-", "-", "-", "-", "-"
        );
    } else {
        let _ = write!(
            out,
            " {label:<8}{:>6} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>9.1}\x1b[K\n",
            r.count, r.min_us, r.p50_us, r.p95_us, r.p99_us, r.p999_us, r.max_us
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_dashboard_noops() {
        let ui = Dashboard::new();
        assert!(!ui.is_active());
        // update/shutdown before init must not touch terminal state.
        ui.update(
            &LatencyReport::default(),
            &LatencyReport::default(),
            &LatencyReport::default(),
        );
        ui.shutdown();
        assert!(!ui.is_active());
    }

    #[test]
    fn test_draw_dashboard_emits_seven_lines() {
        let mut buf = Vec::new();
        let report = LatencyReport {
            count: 10,
            min_us: 1.0,
            max_us: 9.0,
            mean_us: 5.0,
            stdev_us: 1.0,
            p50_us: 5.0,
            p95_us: 8.0,
            p99_us: 9.0,
            p999_us: 9.0,
            p9999_us: 9.0,
        };
        draw_dashboard(&mut buf, 80, &report, &report, &LatencyReport::default());

        let text = String::from_utf8(buf).unwrap();
        // Six newlines: the seventh line deliberately has none.
        assert_eq!(text.matches('\n').count(), 6);
        assert!(text.contains("TX Send"));
        assert!(text.contains("RX Proc"));
        assert!(text.contains("RX Intv"));
        assert!(text.contains("Packet Log"));
        // Empty report renders dashes.
        assert!(text.contains(" RX Intv      -"));
    }
}
