use std::io::{self, Write};

/// In-place `done/total` counter on stderr. A disabled counter prints nothing.
pub struct Progress {
    desc: &'static str,
    unit: &'static str,
    total: usize,
    done: usize,
    enabled: bool,
}

impl Progress {
    pub fn new(desc: &'static str, unit: &'static str, total: usize, enabled: bool) -> Self {
        let progress = Self {
            desc,
            unit,
            total,
            done: 0,
            enabled: enabled && total > 0,
        };
        progress.draw();
        progress
    }

    fn draw(&self) {
        if !self.enabled {
            return;
        }
        let mut err = io::stderr().lock();
        let _ = write!(
            err,
            "\r{}: {}/{} {}",
            self.desc, self.done, self.total, self.unit
        );
        let _ = err.flush();
    }

    pub fn tick(&mut self) {
        self.done = (self.done + 1).min(self.total);
        self.draw();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if self.enabled {
            let _ = writeln!(io::stderr());
        }
    }
}
