//! Command behavior flags.

use bitflags::bitflags;

bitflags! {
    /// How a reader produced by a command behaves.
    ///
    /// Flags combine with `|`:
    ///
    /// ```rust,ignore
    /// let behavior = CommandBehavior::CLOSE_CONNECTION | CommandBehavior::SINGLE_ROW;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandBehavior: u8 {
        /// Only the first result set is exposed; `next_result` returns false.
        const SINGLE_RESULT = 0x01;
        /// At most one row of the first result set is exposed.
        const SINGLE_ROW = 0x02;
        /// Closing the reader also closes the connection.
        const CLOSE_CONNECTION = 0x04;
    }
}

impl CommandBehavior {
    /// No flags: the reader is independent of the connection's lifetime.
    pub const DEFAULT: Self = Self::empty();

    /// Whether closing the reader closes the connection.
    #[must_use]
    pub fn closes_connection(self) -> bool {
        self.contains(Self::CLOSE_CONNECTION)
    }

    /// Whether only the first result set is exposed.
    #[must_use]
    pub fn single_result(self) -> bool {
        self.intersects(Self::SINGLE_RESULT | Self::SINGLE_ROW)
    }

    /// Whether only the first row is exposed.
    #[must_use]
    pub fn single_row(self) -> bool {
        self.contains(Self::SINGLE_ROW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert_eq!(CommandBehavior::default(), CommandBehavior::DEFAULT);
        assert!(!CommandBehavior::DEFAULT.closes_connection());
        assert!(!CommandBehavior::DEFAULT.single_result());
    }

    #[test]
    fn test_single_row_implies_single_result() {
        let behavior = CommandBehavior::SINGLE_ROW;
        assert!(behavior.single_row());
        assert!(behavior.single_result());
        assert!(!CommandBehavior::SINGLE_RESULT.single_row());
    }

    #[test]
    fn test_combination() {
        let behavior = CommandBehavior::CLOSE_CONNECTION | CommandBehavior::SINGLE_RESULT;
        assert!(behavior.closes_connection());
        assert!(behavior.single_result());
    }
}
