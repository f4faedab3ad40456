use std::collections::HashMap;
use std::io::{self, Write};

use teletype_core::LinkClick;
use teletype_engine::{PageSnapshot, RevealEvent};

/// Prints the page to a terminal stream.
///
/// Revealed units are held back until their flash, so text appears in step
/// with the tone rather than when it was attached.
pub(crate) struct Renderer<W: Write> {
    out: W,
    attached: HashMap<usize, (bool, String)>,
}

impl<W: Write> Renderer<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out,
            attached: HashMap::new(),
        }
    }

    pub(crate) fn reveal(&mut self, event: &RevealEvent) -> io::Result<()> {
        match event {
            RevealEvent::Attached {
                seq, nested, text, ..
            } => {
                self.attached.insert(*seq, (*nested, collapse(text)));
            }
            RevealEvent::Flashed { seq, .. } => {
                if let Some((nested, text)) = self.attached.remove(seq) {
                    if !text.is_empty() {
                        let indent = if nested { "  " } else { "" };
                        writeln!(self.out, "{indent}{text}")?;
                        self.out.flush()?;
                    }
                }
            }
            RevealEvent::Completed { .. } => self.attached.clear(),
            RevealEvent::ToneScheduled { .. } | RevealEvent::ToneSkipped { .. } => {}
        }
        Ok(())
    }

    pub(crate) fn snapshot(&mut self, snapshot: &PageSnapshot) -> io::Result<()> {
        let sound = snapshot.sound_label.as_deref().unwrap_or("SFX: n/a");
        writeln!(self.out, "== {} == [{sound}]", snapshot.title)
    }

    /// A page that arrived in one piece.
    pub(crate) fn page(&mut self, url: &str, text: &str) -> io::Result<()> {
        writeln!(self.out, "-- {url}")?;
        for line in text.lines().map(collapse).filter(|l| !l.is_empty()) {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    pub(crate) fn links(&mut self, links: &[LinkClick]) -> io::Result<()> {
        if links.is_empty() {
            return writeln!(self.out, "(no links)");
        }
        for (n, link) in links.iter().enumerate() {
            let marker = if link.target.is_some() || link.download || link.opt_out {
                " *"
            } else {
                ""
            };
            writeln!(self.out, "[{}] {}{marker}", n + 1, link.href)?;
        }
        Ok(())
    }

    pub(crate) fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "-- {text}")
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
