/// Calculates the 1-based line and column number for a given byte offset in the source text.
/// Only called on the error path, so the linear scan is acceptable.
pub fn get_line_and_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// The inverse of [`get_line_and_column`]: maps a 1-based line/column pair back to a byte
/// offset, clamped to the end of the source.
pub fn get_offset(source: &str, line: usize, column: usize) -> usize {
    let mut current_line = 1;
    let mut current_column = 1;
    for (i, c) in source.char_indices() {
        if current_line == line && current_column >= column {
            return i;
        }
        if c == '\n' {
            if current_line == line {
                return i;
            }
            current_line += 1;
            current_column = 1;
        } else {
            current_column += 1;
        }
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column_round_trip() {
        let source = "first\nsecond line\nthird";
        let offset = source.find("line").unwrap();
        let (line, column) = get_line_and_column(source, offset);
        assert_eq!((line, column), (2, 8));
        assert_eq!(get_offset(source, line, column), offset);
    }

    #[test]
    fn test_offset_is_clamped() {
        let source = "a\nb";
        assert_eq!(get_offset(source, 9, 1), source.len());
        assert_eq!(get_offset(source, 1, 40), 1);
    }
}
