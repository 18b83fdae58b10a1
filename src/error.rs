use thiserror::Error;

/// Errors raised while assembling a target document.
///
/// The first two are contract violations and abort the current target. The
/// last two are data-quality gaps: the assembler logs them and drops only the
/// affected fragment.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no root element defined on the output document")]
    NoRootDefined,

    #[error("output node {0} is not an element and cannot take children")]
    InvalidParentNode(usize),

    #[error("fraction fact {name} has no discoverable {component}")]
    MissingFractionComponent { name: String, component: &'static str },

    #[error("footnote relationship references unknown id {0}")]
    DanglingFootnoteReference(String),
}

impl ExtractError {
    /// Data-quality gaps degrade gracefully; contract violations do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractError::MissingFractionComponent { .. }
                | ExtractError::DanglingFootnoteReference(_)
        )
    }
}
