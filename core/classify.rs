use crate::languages::{Language, LanguageTable};
use log;

/// Leading bytes inspected for NUL bytes.
pub const SNIFF_WINDOW: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextVerdict {
    Text,
    /// NUL byte inside the sniff window.
    NulByte,
    /// No NUL byte, but the whole file is not valid UTF-8.
    InvalidEncoding,
}

#[derive(Debug, Clone)]
pub struct Classification<'t> {
    pub verdict: TextVerdict,
    pub language: &'t Language,
}

impl Classification<'_> {
    pub fn is_binary(&self) -> bool {
        self.verdict != TextVerdict::Text
    }

    pub fn is_markdown(&self) -> bool {
        self.language.markdown
    }
}

/// Classifies already-read bytes. The caller is responsible for reading the
/// file; read failures are access errors, not classification results.
pub fn classify<'t>(bytes: &[u8], rel_path: &str, table: &'t LanguageTable) -> Classification<'t> {
    let language = table.detect(rel_path);
    let verdict = text_verdict(bytes);
    if verdict != TextVerdict::Text {
        log::debug!("Classified {} as binary ({:?})", rel_path, verdict);
    }
    Classification { verdict, language }
}

pub fn text_verdict(bytes: &[u8]) -> TextVerdict {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.contains(&0) {
        return TextVerdict::NulByte;
    }
    if std::str::from_utf8(bytes).is_err() {
        return TextVerdict::InvalidEncoding;
    }
    TextVerdict::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_utf8_is_text() {
        assert_eq!(text_verdict("héllo\nwörld".as_bytes()), TextVerdict::Text);
        assert_eq!(text_verdict(b""), TextVerdict::Text);
    }

    #[test]
    fn nul_in_window_is_binary() {
        assert_eq!(text_verdict(b"abc\0def"), TextVerdict::NulByte);
    }

    #[test]
    fn invalid_utf8_after_window_is_still_binary() {
        let mut bytes = vec![b'a'; SNIFF_WINDOW + 10];
        bytes.push(0xFF);
        assert_eq!(text_verdict(&bytes), TextVerdict::InvalidEncoding);
    }

    #[test]
    fn nul_beyond_window_is_not_sniffed() {
        let mut bytes = vec![b'a'; SNIFF_WINDOW];
        bytes.push(0);
        // NUL is valid UTF-8, so only the window check could catch it.
        assert_eq!(text_verdict(&bytes), TextVerdict::Text);
    }

    #[test]
    fn classification_carries_language() {
        let table = LanguageTable::builtin().unwrap();
        let c = classify(b"# Title\n", "docs/guide.md", &table);
        assert!(!c.is_binary());
        assert!(c.is_markdown());
        let c = classify(b"\x89PNG\r\n\x1a\n\0\0", "logo.png", &table);
        assert!(c.is_binary());
        assert_eq!(c.language.name, "unknown");
    }
}
