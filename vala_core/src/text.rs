use std::fmt;

#[derive(Copy, Clone, PartialEq)]
pub struct TextRange {
    start: TextOffset,
    end: TextOffset,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextOffset(u32);

/// 1-based line and 1-based byte column, pointing at a glyph (inclusive).
#[derive(Copy, Clone, PartialEq)]
pub struct TextLocation {
    line: u32,
    col: u32,
}

impl TextRange {
    #[inline]
    pub const fn new(start: TextOffset, end: TextOffset) -> TextRange {
        assert!(start.0 <= end.0);
        TextRange { start, end }
    }
    #[inline]
    pub const fn empty_at(offset: TextOffset) -> TextRange {
        TextRange { start: offset, end: offset }
    }
    #[inline]
    pub const fn start(self) -> TextOffset {
        self.start
    }
    #[inline]
    pub const fn end(self) -> TextOffset {
        self.end
    }
    #[inline]
    pub const fn len(self) -> usize {
        (self.end.0 - self.start.0) as usize
    }
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
    #[inline]
    pub fn as_usize(self) -> std::ops::Range<usize> {
        self.start.into()..self.end.into()
    }
    #[inline]
    pub fn extend_by(&mut self, by: TextOffset) {
        self.end += by;
    }
    /// offset of the last byte, or the start for empty ranges
    #[inline]
    pub fn last_byte(self) -> TextOffset {
        if self.is_empty() {
            self.start
        } else {
            TextOffset(self.end.0 - 1)
        }
    }
    #[inline]
    pub const fn contains_exclusive(self, offset: TextOffset) -> bool {
        offset.0 >= self.start.0 && offset.0 < self.end.0
    }
    #[inline]
    pub const fn contains_inclusive(self, offset: TextOffset) -> bool {
        offset.0 >= self.start.0 && offset.0 <= self.end.0
    }
    #[inline]
    pub fn union(self, other: TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl TextLocation {
    #[inline]
    pub const fn new(line: u32, col: u32) -> TextLocation {
        TextLocation { line, col }
    }
    #[inline]
    pub const fn line(&self) -> u32 {
        self.line
    }
    #[inline]
    pub const fn col(&self) -> u32 {
        self.col
    }
}

impl From<u32> for TextOffset {
    #[inline]
    fn from(value: u32) -> TextOffset {
        TextOffset(value)
    }
}

impl From<TextOffset> for u32 {
    #[inline]
    fn from(value: TextOffset) -> u32 {
        value.0
    }
}

impl From<TextOffset> for usize {
    #[inline]
    fn from(value: TextOffset) -> usize {
        value.0 as usize
    }
}

impl std::ops::Add for TextOffset {
    type Output = TextOffset;
    #[inline]
    fn add(self, rhs: TextOffset) -> TextOffset {
        (self.0 + rhs.0).into()
    }
}

impl std::ops::AddAssign for TextOffset {
    #[inline]
    fn add_assign(&mut self, rhs: TextOffset) {
        self.0 += rhs.0;
    }
}

impl fmt::Debug for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.0, self.end.0)
    }
}

impl fmt::Debug for TextOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Splits `text` into per-line ranges, each including its `\n` terminator.
pub fn find_line_ranges(text: &str) -> Vec<TextRange> {
    let mut ranges = Vec::new();
    let mut range = TextRange::empty_at(0.into());
    for byte in text.bytes() {
        range.extend_by(1.into());
        if byte == b'\n' {
            ranges.push(range);
            range = TextRange::empty_at(range.end());
        }
    }
    if !range.is_empty() {
        ranges.push(range);
    }
    ranges
}

/// Maps a byte offset to its 1-based line and byte column.
/// Offsets at or past the end of text land on the last line.
pub fn find_location(offset: TextOffset, line_ranges: &[TextRange]) -> TextLocation {
    if line_ranges.is_empty() {
        return TextLocation::new(1, 1);
    }
    let line = line_ranges
        .partition_point(|range| range.start() <= offset)
        .saturating_sub(1);
    let range = line_ranges[line];
    let col = u32::from(offset).saturating_sub(range.start().into()) + 1;
    TextLocation::new(line as u32 + 1, col)
}

/// Byte range of a 0-based line. Positions one past the last line address
/// the empty tail after a trailing newline.
pub fn line_range(line_ranges: &[TextRange], line: u32) -> TextRange {
    if line_ranges.is_empty() {
        TextRange::empty_at(0.into())
    } else if (line as usize) < line_ranges.len() {
        line_ranges[line as usize]
    } else {
        let last = line_ranges[line_ranges.len() - 1];
        TextRange::empty_at(last.end())
    }
}

/// Byte offset of a 0-based `(line, character)` position, `character`
/// counted in UTF-8 code units and clamped to the line range.
pub fn offset_at(line_ranges: &[TextRange], line: u32, character: u32) -> TextOffset {
    let range = line_range(line_ranges, line);
    let len = range.len() as u32;
    let offset = u32::from(range.start()) + character.min(len);
    offset.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_ranges_and_locations() {
        let text = "foo\nbaz";
        let ranges = find_line_ranges(text);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], TextRange::new(0.into(), 4.into()));
        assert_eq!(ranges[1], TextRange::new(4.into(), 7.into()));

        assert_eq!(find_location(0.into(), &ranges), TextLocation::new(1, 1));
        assert_eq!(find_location(3.into(), &ranges), TextLocation::new(1, 4));
        assert_eq!(find_location(4.into(), &ranges), TextLocation::new(2, 1));
        assert_eq!(find_location(6.into(), &ranges), TextLocation::new(2, 3));
    }

    #[test]
    fn offset_at_counts_code_units() {
        let text = "ab\ncafé x\n";
        let ranges = find_line_ranges(text);
        assert_eq!(offset_at(&ranges, 0, 0), 0.into());
        assert_eq!(offset_at(&ranges, 0, 2), 2.into());
        // `é` is two bytes: `caf` = 3, `é` = 2, so ` ` sits at 3 + 5
        assert_eq!(offset_at(&ranges, 1, 5), 8.into());
        // clamped to the line range
        assert_eq!(offset_at(&ranges, 1, 100), 11.into());
        // one past the last line addresses the empty tail
        assert_eq!(offset_at(&ranges, 2, 0), 11.into());
    }

    #[test]
    fn union_grows_both_ends() {
        let a = TextRange::new(4.into(), 6.into());
        let b = TextRange::new(1.into(), 5.into());
        assert_eq!(a.union(b), TextRange::new(1.into(), 6.into()));
    }
}
