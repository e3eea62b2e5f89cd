/// Sent whenever the quote source is unavailable, exactly as written.
pub const FALLBACK_QUOTE: &str = "Believe you can and you're halfway there. - Theodore Roosevelt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quote {
    Fetched { text: String, author: String },
    Fallback,
}

impl Quote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self::Fetched {
            text: text.into(),
            author: author.into(),
        }
    }

    pub fn fallback() -> Self {
        Self::Fallback
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quote::Fetched { text, author } => write!(f, "\"{text}\" - {author}"),
            Quote::Fallback => f.write_str(FALLBACK_QUOTE),
        }
    }
}
