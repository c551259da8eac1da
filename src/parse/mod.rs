mod error;
mod grammar;

pub use error::ParseError;

use crate::SegmentDefinition;

/// Parse a DSL input string into a [`SegmentDefinition`].
///
/// ```
/// let def = segquery::parse::parse(r#"
///     segment "Hanoi" {
///         dataset customers
///         where city = "Hanoi"
///     }
/// "#).unwrap();
/// assert_eq!(def.conditions.len(), 1);
/// ```
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not valid DSL syntax.
pub fn parse(input: &str) -> Result<SegmentDefinition, ParseError> {
    use winnow::Parser;
    grammar::segment
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string(), e.offset()))
}
