//! In-place terminal progress display.
//!
//! Re-renders the whole progress block on every update: the cursor moves
//! back up over the previous render, the region is cleared, and all lines
//! are printed again. Completed lines get a green check.

use std::io::{stdout, Write};

use crossterm::{
    cursor,
    execute,
    style::Stylize,
    terminal::{Clear, ClearType},
};

use scout_core::notify::{ProgressLine, ProgressRender};

pub struct ConsolePrinter {
    rendered_lines: u16,
}

impl ConsolePrinter {
    pub fn new() -> Self {
        Self { rendered_lines: 0 }
    }
}

impl Default for ConsolePrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRender for ConsolePrinter {
    fn render(&mut self, lines: &[ProgressLine]) {
        let mut out = stdout();

        if self.rendered_lines > 0 {
            let _ = execute!(
                out,
                cursor::MoveUp(self.rendered_lines),
                Clear(ClearType::FromCursorDown)
            );
        }

        for line in lines {
            if line.done {
                println!("{} {}", "✓".green(), line.message);
            } else {
                println!("  {}", line.message);
            }
        }

        let _ = out.flush();
        self.rendered_lines = lines.len() as u16;
    }
}
