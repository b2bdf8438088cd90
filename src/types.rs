// types.rs
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
    /// Only the context names, one per line
    Name,
}

/// Which half of a cleanup run ends up on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Kept,
    Removed,
}

impl Selection {
    pub fn from_print_removed(print_removed: bool) -> Self {
        if print_removed {
            Selection::Removed
        } else {
            Selection::Kept
        }
    }
}
