//! Terminal rendering: sizes, progress lines, and the code as a QR block.

use peerdrop_core::Progress;
use qrcode::{Color, QrCode};

const BAR_WIDTH: usize = 30;

/// Human-readable byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// One-line progress bar, e.g. `[##########----]  40.9%  16.0 KiB / 39.1 KiB`.
pub fn progress_line(progress: &Progress) -> String {
    let percent = progress.percent.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>5.1}%  {} / {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent,
        format_size(progress.bytes_transferred),
        format_size(progress.total_bytes),
    )
}

/// Render `data` as a QR code made of Unicode half blocks, two module rows
/// per text line, with a light border so it scans on dark terminals.
pub fn render_qr_unicode(data: &str) -> Option<String> {
    let code = QrCode::new(data.as_bytes()).ok()?;
    let width = code.width();
    let modules = code.to_colors();

    // Quiet zone of two modules on every side.
    let padded = width + 4;
    let dark = |x: usize, y: usize| -> bool {
        if x < 2 || y < 2 || x >= width + 2 || y >= width + 2 {
            return false;
        }
        modules[(y - 2) * width + (x - 2)] == Color::Dark
    };

    let mut result = String::new();
    for y in (0..padded).step_by(2) {
        result.push_str("  ");
        for x in 0..padded {
            // Light modules are drawn, dark ones left blank.
            let ch = match (dark(x, y), dark(x, y + 1)) {
                (true, true) => ' ',
                (true, false) => '▄',
                (false, true) => '▀',
                (false, false) => '█',
            };
            result.push(ch);
        }
        result.push('\n');
    }
    Some(result)
}
