//! Pagination cursors. Each is owned by exactly one fetch loop.

/// Number-based pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub index: u32,
}

impl PageCursor {
    pub fn advance(&mut self) {
        self.index += 1;
    }
}

/// Offset-based pagination with a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetCursor {
    pub offset: u32,
    step: u32,
}

impl OffsetCursor {
    pub fn new(step: u32) -> Self {
        Self { offset: 0, step }
    }

    pub fn advance(&mut self) {
        self.offset += self.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_cursor_advances_by_one() {
        let mut cursor = PageCursor::default();
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.index, 2);
    }

    #[test]
    fn test_offset_cursor_advances_by_step() {
        let mut cursor = OffsetCursor::new(30);
        assert_eq!(cursor.offset, 0);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.offset, 60);
    }
}
