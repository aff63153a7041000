use instant::Instant;

use crate::prettyprint_usize;

const PROGRESS_FREQUENCY_SECONDS: f64 = 1.0;

pub fn prettyprint_time(seconds: f64) -> String {
    format!("{:.4}s", seconds)
}

fn elapsed_seconds(since: Instant) -> f64 {
    let dt = since.elapsed();
    (dt.as_secs() as f64) + (f64::from(dt.subsec_nanos()) * 1e-9)
}

struct Progress {
    label: String,
    processed_items: usize,
    total_items: usize,
    started_at: Instant,
    last_printed_at: Instant,
}

impl Progress {
    // Returns true when done
    fn next(&mut self) -> bool {
        self.processed_items += 1;
        if self.processed_items > self.total_items {
            panic!(
                "{} is too few items for {} progress",
                prettyprint_usize(self.total_items),
                self.label
            );
        }

        if self.processed_items == self.total_items {
            debug!(
                "{} ({})... {}",
                self.label,
                prettyprint_usize(self.total_items),
                prettyprint_time(elapsed_seconds(self.started_at))
            );
            return true;
        }
        if elapsed_seconds(self.last_printed_at) >= PROGRESS_FREQUENCY_SECONDS {
            self.last_printed_at = Instant::now();
            debug!(
                "{}: {}/{}... {}",
                self.label,
                prettyprint_usize(self.processed_items),
                prettyprint_usize(self.total_items),
                prettyprint_time(elapsed_seconds(self.started_at))
            );
        }
        false
    }
}

enum StackEntry {
    Span(String, Instant),
    Progress(Progress),
}

/// Hierarchical timing of pipeline stages. Spans and progress counters are reported through the
/// `log` crate as they happen; notes and warnings are also repeated once the outermost span ends,
/// so the interesting parts of a long run don't need to be scrolled back to.
pub struct Timer {
    outermost_name: String,
    stack: Vec<StackEntry>,
    results: Vec<String>,
    notes: Vec<String>,
    warnings: Vec<String>,
}

impl Timer {
    pub fn new<I: Into<String>>(name: I) -> Timer {
        let name = name.into();
        let mut t = Timer {
            outermost_name: name.clone(),
            stack: Vec::new(),
            results: Vec::new(),
            notes: Vec::new(),
            warnings: Vec::new(),
        };
        t.start(name);
        t
    }

    /// For tests and callers that don't care about the timing output.
    pub fn throwaway() -> Timer {
        Timer::new("throwaway")
    }

    pub fn start<I: Into<String>>(&mut self, name: I) {
        let name = name.into();
        debug!("{}...", name);
        self.stack.push(StackEntry::Span(name, Instant::now()));
    }

    pub fn stop<I: Into<String>>(&mut self, name: I) {
        let name = name.into();
        let started_at = match self.stack.pop() {
            Some(StackEntry::Span(span, started_at)) => {
                assert_eq!(span, name);
                started_at
            }
            Some(StackEntry::Progress(p)) => {
                panic!("Can't stop({}) while Progress({}) is running", name, p.label)
            }
            None => panic!("Can't stop({}), nothing was started", name),
        };
        let line = format!(
            "{}- {} took {}",
            "  ".repeat(self.stack.len()),
            name,
            prettyprint_time(elapsed_seconds(started_at))
        );
        debug!("{}", line.trim_start());
        self.results.push(line);
    }

    pub fn start_iter<I: Into<String>>(&mut self, name: I, total_items: usize) {
        if total_items == 0 {
            return;
        }
        let label = name.into();
        if let Some(StackEntry::Progress(p)) = self.stack.last() {
            panic!(
                "Can't start_iter({}) while Progress({}) is top of the stack",
                label, p.label
            );
        }
        self.stack.push(StackEntry::Progress(Progress {
            label,
            processed_items: 0,
            total_items,
            started_at: Instant::now(),
            last_printed_at: Instant::now(),
        }));
    }

    pub fn next(&mut self) {
        let done = if let Some(StackEntry::Progress(ref mut progress)) = self.stack.last_mut() {
            progress.next()
        } else {
            panic!("Can't next() while a span is top of the stack");
        };
        if done {
            self.stack.pop();
        }
    }

    /// Log immediately, but also repeat at the end.
    pub fn note<I: Into<String>>(&mut self, line: I) {
        let line = line.into();
        info!("{}", line);
        self.notes.push(line);
    }

    /// Warnings are only printed at the end, once.
    pub fn warn<I: Into<String>>(&mut self, line: I) {
        self.warnings.push(line.into());
    }

    pub fn num_warnings(&self) -> usize {
        self.warnings.len()
    }

    /// Used to end the scope of a timer early.
    pub fn done(self) {}
}

impl std::ops::Drop for Timer {
    fn drop(&mut self) {
        // If we're in the middle of unwinding a panic, don't further blow up.
        match self.stack.last() {
            Some(StackEntry::Span(ref name, _)) if self.stack.len() == 1 => {
                if *name != self.outermost_name {
                    return;
                }
            }
            _ => {
                debug!("dropping Timer {} with an unbalanced stack", self.outermost_name);
                return;
            }
        }

        let name = self.outermost_name.clone();
        self.stop(name);
        for line in &self.results {
            debug!("{}", line);
        }
        if !self.notes.is_empty() {
            info!("{} notes:", self.notes.len());
            for line in &self.notes {
                info!("  {}", line);
            }
        }
        if !self.warnings.is_empty() {
            warn!("{} warnings:", self.warnings.len());
            for line in &self.warnings {
                warn!("  {}", line);
            }
        }
    }
}
