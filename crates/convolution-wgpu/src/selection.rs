//! Ordered effect selection supplied by the user interface
//!
//! The selection is owned by whatever front end lets the user toggle effects.
//! The renderer only ever reads a snapshot of it at the start of a render.

/// Effects offered in the default menu, in display order
pub const DEFAULT_MENU: &[&str] = &["sharpness", "unsharpen", "edgeDetect", "sobelHorizontal", "previtHorizontal", "emboss"];

/// A single menu row: a kernel name and whether it is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectToggle {
    /// Name of the kernel in the registry
    pub kernel_name: String,
    /// Whether the effect is applied
    pub enabled: bool,
}

impl EffectToggle {
    /// Creates a menu row
    pub fn new(kernel_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            enabled,
        }
    }
}

/// Ordered list of effects with their enabled flags
///
/// Passes are applied in list order, not in the order the user enabled them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectSelection {
    rows: Vec<EffectToggle>,
}

impl EffectSelection {
    /// Creates a selection from explicit rows
    pub fn new(rows: Vec<EffectToggle>) -> Self {
        Self { rows }
    }

    /// Creates the default menu with every effect disabled
    pub fn default_menu() -> Self {
        Self::new(DEFAULT_MENU.iter().map(|name| EffectToggle::new(*name, false)).collect())
    }

    /// Creates a selection where every listed effect is enabled, in order
    pub fn enabled_in_order<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(|name| EffectToggle::new(name, true)).collect())
    }

    /// Returns all rows
    pub fn rows(&self) -> &[EffectToggle] {
        &self.rows
    }

    /// Iterates over the names of enabled effects, in list order
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().filter(|row| row.enabled).map(|row| row.kernel_name.as_str())
    }

    /// Returns the number of enabled effects
    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    /// Sets the enabled flag of every row named `kernel_name`
    ///
    /// Returns `true` when any row changed, which is the caller's cue to re-render.
    pub fn set_enabled(&mut self, kernel_name: &str, enabled: bool) -> bool {
        let mut changed = false;
        for row in self.rows.iter_mut().filter(|row| row.kernel_name == kernel_name) {
            if row.enabled != enabled {
                row.enabled = enabled;
                changed = true;
            }
        }
        changed
    }

    /// Flips the enabled flag of every row named `kernel_name`
    ///
    /// Returns `true` when a row was found.
    pub fn toggle(&mut self, kernel_name: &str) -> bool {
        let mut found = false;
        for row in self.rows.iter_mut().filter(|row| row.kernel_name == kernel_name) {
            row.enabled = !row.enabled;
            found = true;
        }
        found
    }

    /// Takes an immutable copy for a single render
    pub fn snapshot(&self) -> EffectSelection {
        self.clone()
    }
}
