use crate::converter::GlyphGrid;
use crate::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use log::debug;
use std::io::{stdout, Stdout, Write};

/// Destination for rendered frames
pub trait FrameSink {
    /// Prepare the output before the first frame
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Replace whatever is on screen with `grid`
    fn present(&mut self, grid: &GlyphGrid) -> Result<()>;

    /// Restore the output after the last frame
    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Terminal renderer for glyph grids
pub struct Renderer<W: Write = Stdout> {
    out: W,
    active: bool,
    frames_rendered: u64,
}

impl Renderer<Stdout> {
    /// Create a renderer writing to standard output
    pub fn new() -> Self {
        Self::with_writer(stdout())
    }
}

impl Default for Renderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Renderer<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            active: false,
            frames_rendered: 0,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl<W: Write> FrameSink for Renderer<W> {
    fn init(&mut self) -> Result<()> {
        execute!(self.out, Hide, MoveTo(0, 0), Clear(ClearType::All))?;
        self.active = true;
        debug!("Terminal initialized for rendering");
        Ok(())
    }

    fn present(&mut self, grid: &GlyphGrid) -> Result<()> {
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::All), Print(grid.as_str()))?;
        self.out.flush()?;
        self.frames_rendered += 1;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.active {
            self.active = false;
            execute!(self.out, Show)?;
            debug!("Terminal restored after {} frames", self.frames_rendered);
        }
        Ok(())
    }
}

impl<W: Write> Drop for Renderer<W> {
    fn drop(&mut self) {
        // Ensure the cursor comes back even on early exit
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(text: &str) -> GlyphGrid {
        GlyphGrid {
            width: text.lines().next().map_or(0, |l| l.len() as u32),
            height: text.lines().count() as u32,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_present_clears_then_prints() {
        let mut out = Vec::new();
        {
            let mut renderer = Renderer::with_writer(&mut out);
            renderer.present(&grid("@@\n..\n")).unwrap();
            assert_eq!(renderer.frames_rendered(), 1);
        }

        let written = String::from_utf8(out).unwrap();
        let clear = written.find("\x1b[2J").expect("clear sequence");
        let body = written.find("@@\n..\n").expect("grid body");
        assert!(clear < body);
    }

    #[test]
    fn test_cursor_hidden_and_restored() {
        let mut out = Vec::new();
        {
            let mut renderer = Renderer::with_writer(&mut out);
            renderer.init().unwrap();
            renderer.present(&grid("#\n")).unwrap();
            renderer.cleanup().unwrap();
            // Second cleanup writes nothing
            renderer.cleanup().unwrap();
        }

        let written = String::from_utf8(out).unwrap();
        assert_eq!(written.matches("\x1b[?25l").count(), 1);
        assert_eq!(written.matches("\x1b[?25h").count(), 1);
    }

    #[test]
    fn test_drop_restores_cursor() {
        let mut out = Vec::new();
        {
            let mut renderer = Renderer::with_writer(&mut out);
            renderer.init().unwrap();
        }
        let written = String::from_utf8(out).unwrap();
        assert!(written.ends_with("\x1b[?25h"));
    }
}
