use thiserror::Error;

/// Unified result type for the Berth MVP crate.
pub type Result<T> = std::result::Result<T, DockError>;

/// Errors surfaced by the docking engine MVP.
#[derive(Debug, Error)]
pub enum DockError {
    #[error("panel `{0}` is already registered")]
    DuplicatePanel(String),
    #[error("panel `{panel}` references unknown sibling `{sibling}`")]
    UnknownSibling { panel: String, sibling: String },
    #[error("cyclic placement defaults among: {}", .0.join(", "))]
    CyclicPlacement(Vec<String>),
}
