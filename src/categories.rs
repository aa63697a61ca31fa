//! Category table shared by training data and the classifier output layer
//!
//! The position of a label in [`CATEGORIES`] is the class index the model
//! predicts. The ordering is a contract with the persisted artifact and is
//! never checked against it at runtime.

use std::path::Path;

/// Spoken commands, in output-index order
pub const COMMANDS: &[&str] = &[
    "yes", "no", "up", "down", "left", "right", "on", "off", "stop", "go",
];

/// Catch-all for words outside [`COMMANDS`]
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Reserved for a future silence class; not part of [`CATEGORIES`]
pub const SILENCE_CATEGORY: &str = "silence";

/// All classes the model scores: the commands followed by the unknown category
pub const CATEGORIES: &[&str] = &[
    "yes", "no", "up", "down", "left", "right", "on", "off", "stop", "go", UNKNOWN_CATEGORY,
];

/// Number of model outputs
pub const NUM_CATEGORIES: usize = CATEGORIES.len();

/// Index of [`UNKNOWN_CATEGORY`] in [`CATEGORIES`]
pub const UNKNOWN_INDEX: usize = COMMANDS.len();

/// Label for a class index, `None` past the end of the table
pub fn category_for_index(index: usize) -> Option<&'static str> {
    CATEGORIES.get(index).copied()
}

/// Class index for a label; anything that is not a command maps to the unknown index
pub fn index_for_label(label: &str) -> usize {
    COMMANDS
        .iter()
        .position(|command| *command == label)
        .unwrap_or(UNKNOWN_INDEX)
}

pub fn is_known_command(label: &str) -> bool {
    COMMANDS.contains(&label)
}

/// Ground-truth class index for a dataset file laid out as `<word>/<clip>.wav`
pub fn index_for_path(path: &Path) -> usize {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .map(index_for_label)
        .unwrap_or(UNKNOWN_INDEX)
}
