//! Non-fatal diagnostics collected while ordering scripts and resolving modules.
//!
//! Fatal problems abort through `anyhow` errors. Everything else lands here:
//! it is printed the moment it is detected (so the surrounding progress output
//! gives it context) and kept so callers and tests can inspect it afterwards.

/// Where a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Script catalog scan (unknown stage, unreadable marker).
    Catalog,
    /// Script level computation (unmet capability, level overflow).
    Order,
    /// `# INITRD:` directive parsing.
    Directive,
    /// Kernel module resolution.
    Modules,
}

/// A single non-fatal problem.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub origin: Origin,
    pub message: String,
}

/// Collector for non-fatal diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    quiet: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector that records without printing.
    pub fn quiet() -> Self {
        Self {
            entries: Vec::new(),
            quiet: true,
        }
    }

    /// Record a warning and print it immediately.
    pub fn warn(&mut self, origin: Origin, message: impl Into<String>) {
        let message = message.into();
        if !self.quiet {
            println!("  Warning: {}", message);
        }
        self.entries.push(Diagnostic { origin, message });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diagnostics raised by one origin.
    pub fn from_origin(&self, origin: Origin) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.origin == origin)
    }

    /// True if any recorded message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }

    /// Print a one-line tally, matching the preflight summary style.
    pub fn print_summary(&self) {
        if self.entries.is_empty() {
            return;
        }
        println!("{} warning(s) reported", self.entries.len());
    }
}
