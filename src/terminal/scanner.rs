//! Inline image marker detection: `[img=<path>]`

pub const MARKER_OPEN: &str = "[img=";
pub const MARKER_CLOSE: &str = "]";

/// An image marker found in console text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Byte offset of the opening `[` in the scanned text
    pub offset: usize,
    /// Cell index of the opening `[` (one cell per character)
    pub index: usize,
    /// Path between the tags, verbatim
    pub file_name: String,
}

impl Marker {
    /// Length of the file name in characters
    pub fn file_name_len(&self) -> usize {
        self.file_name.chars().count()
    }

    /// Length of the whole marker, tags included, in characters
    pub fn len(&self) -> usize {
        MARKER_OPEN.chars().count() + self.file_name_len() + MARKER_CLOSE.chars().count()
    }

    /// Byte offset just past the closing tag
    pub fn end_offset(&self) -> usize {
        self.offset + MARKER_OPEN.len() + self.file_name.len() + MARKER_CLOSE.len()
    }
}

/// Find the first marker in `text`
pub fn scan(text: &str) -> Option<Marker> {
    scan_from(text, 0)
}

/// Find the first marker starting at or after byte offset `from`.
///
/// An open tag with no close tag after it, or with nothing between the tags,
/// yields `None`.
pub fn scan_from(text: &str, from: usize) -> Option<Marker> {
    let rest = text.get(from..)?;
    let offset = from + rest.find(MARKER_OPEN)?;
    let name_start = offset + MARKER_OPEN.len();
    let name_len = text[name_start..].find(MARKER_CLOSE)?;

    if name_len == 0 {
        return None;
    }

    let file_name = text[name_start..name_start + name_len].to_string();
    let index = text[..offset].chars().count();

    Some(Marker {
        offset,
        index,
        file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_file_name() {
        let text = "some text [img=cat.png] more text";
        let marker = scan(text).unwrap();

        assert_eq!(marker.file_name, "cat.png");
        assert_eq!(marker.file_name_len(), 7);
        assert_eq!(marker.offset, 10);
        assert_eq!(&text[marker.offset..marker.offset + 1], "[");
        assert_eq!(marker.len(), 13);
        assert_eq!(&text[marker.end_offset()..], " more text");
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(scan("plain console output"), None);
        assert_eq!(scan(""), None);
    }

    #[test]
    fn test_unterminated_marker() {
        assert_eq!(scan("prefix [img=cat.png and nothing else"), None);
    }

    #[test]
    fn test_empty_file_name() {
        assert_eq!(scan("[img=]"), None);
    }

    #[test]
    fn test_tag_case_is_fixed() {
        assert_eq!(scan("[IMG=cat.png]"), None);
    }

    #[test]
    fn test_first_marker_wins() {
        let text = "[img=a.png] [img=b.gif]";
        let first = scan(text).unwrap();
        assert_eq!(first.file_name, "a.png");

        let second = scan_from(text, first.end_offset()).unwrap();
        assert_eq!(second.file_name, "b.gif");
        assert_eq!(second.offset, 12);
        assert_eq!(scan_from(text, second.end_offset()), None);
    }

    #[test]
    fn test_index_counts_cells_not_bytes() {
        let text = "\u{e9}\u{e9}[img=x.png]";
        let marker = scan(text).unwrap();
        assert_eq!(marker.offset, 4);
        assert_eq!(marker.index, 2);
    }

    #[test]
    fn test_nul_padding_is_searched() {
        let text = "\0\0\0[img=dir/pic.bmp]\0\0";
        let marker = scan(text).unwrap();
        assert_eq!(marker.index, 3);
        assert_eq!(marker.file_name, "dir/pic.bmp");
    }
}
