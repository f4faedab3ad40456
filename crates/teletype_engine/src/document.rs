use scraper::{ElementRef, Html, Selector};

use crate::fragment::Fragment;

/// Element holding the page content that gets revealed.
pub const CONTENT_CONTAINER: &str = "main";
/// Optional sub-container inside the content container.
pub const WRAPPER_CLASS: &str = "wrapper";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("fetched document has no <{0}> content container")]
    MissingContainer(&'static str),
    #[error("invalid selector {0}")]
    Selector(&'static str),
}

/// The parsed result of a fetched page.
///
/// Everything is copied out of the parser's tree, so the parsed document is
/// dropped as soon as construction finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementDocument {
    title: Option<String>,
    header: Option<Fragment>,
    content: Fragment,
    wrapped: bool,
}

impl ReplacementDocument {
    pub fn parse(html: &str) -> Result<Self, ParseError> {
        let doc = Html::parse_document(html);
        let title = select_first(&doc, "title")?
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());
        let header = select_first(&doc, "header")?.and_then(|h| Fragment::copy_of(*h));
        let main = select_first(&doc, CONTENT_CONTAINER)?
            .ok_or(ParseError::MissingContainer(CONTENT_CONTAINER))?;

        let wrapper_sel = selector(".wrapper")?;
        let (source, wrapped) = match main.select(&wrapper_sel).next() {
            Some(wrapper) => (wrapper, true),
            None => (main, false),
        };
        let content = Fragment::copy_of(*source).ok_or(ParseError::MissingContainer(CONTENT_CONTAINER))?;

        Ok(Self {
            title,
            header,
            content,
            wrapped,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn header(&self) -> Option<&Fragment> {
        self.header.as_ref()
    }

    /// The element whose children are revealed: the wrapper when present,
    /// otherwise the content container itself.
    pub fn content(&self) -> &Fragment {
        &self.content
    }

    /// Whether the content sits inside a `.wrapper` sub-container.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }
}

fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css))
}

fn select_first<'a>(doc: &'a Html, css: &'static str) -> Result<Option<ElementRef<'a>>, ParseError> {
    let sel = selector(css)?;
    Ok(doc.select(&sel).next())
}
