/// Session history as a list of URLs with a cursor, like a browser tab's.
#[derive(Debug, Default)]
pub(crate) struct History {
    entries: Vec<String>,
    cursor: usize,
}

impl History {
    pub(crate) fn current(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Adds an entry after the cursor, dropping any forward entries.
    /// Pushing the URL already under the cursor does nothing.
    pub(crate) fn push(&mut self, url: String) {
        if self.current() == Some(url.as_str()) {
            return;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(url);
        self.cursor = self.entries.len() - 1;
    }

    pub(crate) fn back(&mut self) -> Option<String> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        self.current().map(str::to_string)
    }

    pub(crate) fn forward(&mut self) -> Option<String> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.current().map(str::to_string)
    }
}
