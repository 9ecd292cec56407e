use pactcheck_core::Location;

/// Byte offset -> line/column mapping for one file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { starts }
    }

    /// 1-based line and column (in bytes) of `offset`.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let column = offset - self.starts[line];
        (line as u32 + 1, column as u32 + 1)
    }
}

/// An artifact's text together with its display path.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub path: String,
    pub text: String,
    index: LineIndex,
}

impl SourceText {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        Self {
            path: path.into(),
            text,
            index,
        }
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    pub fn location(&self, offset: usize) -> Location {
        let (line, column) = self.index.position(offset);
        Location::new(self.path.clone(), line, column)
    }

    pub fn location_at(&self, line: u32, column: u32) -> Location {
        Location::new(self.path.clone(), line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_offsets_to_lines_and_columns() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.position(0), (1, 1));
        assert_eq!(index.position(1), (1, 2));
        assert_eq!(index.position(3), (2, 1));
        assert_eq!(index.position(6), (3, 1));
        assert_eq!(index.position(8), (4, 2));
    }
}
