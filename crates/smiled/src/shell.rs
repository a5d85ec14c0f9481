//! Terminal view shell — the message area, the celebration burst, and the
//! two controls ("once more", "reset") read from stdin.

use crate::controller::ControlEvent;
use rand::Rng;
use smile_hw::Frame;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Message shown while waiting for a smile.
pub const IDLE_PROMPT: &str = "Smile at the camera 😊";
/// Message shown when the camera cannot be opened.
pub const CAMERA_DENIED_MESSAGE: &str = "😞 Webcam access denied";
/// Message shown when the expression model could not be fetched or loaded.
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "😶 Expression model unavailable";

const CONFETTI_GLYPHS: [char; 6] = ['*', '✦', '•', '·', '❀', '○'];
const CONFETTI_COLORS: [u8; 6] = [91, 92, 93, 94, 95, 96];
const PREVIEW_RAMP: &[u8] = b" .:-=+*#%@";

/// Renders the message area.
#[derive(Debug, Default)]
pub struct ShellView;

impl ShellView {
    pub fn show_message(&self, message: &str) {
        println!("\n  ── {message} ──\n");
    }

    pub fn show_controls(&self) {
        println!("  [o] once more   [r] reset   [q] quit");
    }
}

/// Fire a celebration burst: `particle_count` glyphs scattered over a band
/// whose width scales with `spread_degrees`. Fire-and-forget.
pub fn confetti_burst(particle_count: u32, spread_degrees: f32) {
    let width = ((spread_degrees / 90.0) * 72.0).clamp(16.0, 120.0) as usize;
    let rows = (particle_count as usize / width).clamp(3, 8);
    let density = (particle_count as f64 / (rows * width) as f64).clamp(0.05, 0.95);

    let mut rng = rand::thread_rng();
    for _ in 0..rows {
        let mut line = String::with_capacity(width * 8);
        for _ in 0..width {
            if rng.gen_bool(density) {
                let glyph = CONFETTI_GLYPHS[rng.gen_range(0..CONFETTI_GLYPHS.len())];
                let color = CONFETTI_COLORS[rng.gen_range(0..CONFETTI_COLORS.len())];
                line.push_str(&format!("\x1b[{color}m{glyph}\x1b[0m"));
            } else {
                line.push(' ');
            }
        }
        println!("  {line}");
    }
}

/// Downscale a grayscale frame into an ASCII luminance grid, `cols` wide.
pub fn render_preview(frame: &Frame, cols: usize) -> String {
    let cols = cols.max(1).min(frame.width as usize);
    // Terminal cells are roughly twice as tall as wide.
    let rows = (cols * frame.height as usize / frame.width as usize / 2).max(1);

    let mut out = String::with_capacity((cols + 1) * rows);
    for row in 0..rows {
        for col in 0..cols {
            let x = col * frame.width as usize / cols;
            let y = row * frame.height as usize / rows;
            let pixel = frame.data[y * frame.width as usize + x] as usize;
            let idx = pixel * (PREVIEW_RAMP.len() - 1) / 255;
            out.push(PREVIEW_RAMP[idx] as char);
        }
        out.push('\n');
    }
    out
}

/// Read control lines from stdin and forward them as events. Unrecognized
/// input is echoed back with the control hints.
pub fn spawn_input(tx: mpsc::Sender<ControlEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let event = match line.trim().to_lowercase().as_str() {
                "" => continue,
                "o" | "once" | "once more" => ControlEvent::OnceMore,
                "r" | "reset" => ControlEvent::Reset,
                "q" | "quit" => ControlEvent::Shutdown,
                other => {
                    println!("  unknown control: {other:?}");
                    ShellView.show_controls();
                    continue;
                }
            };
            let stop = matches!(event, ControlEvent::Shutdown);
            if tx.send(event).await.is_err() || stop {
                break;
            }
        }
    })
}
