use std::fmt;

/// How a result appears when embedded in narrative text.
#[derive(Debug, Clone, PartialEq)]
pub enum Narrative {
    /// Markdown inserted verbatim.
    Markdown(String),
    /// A pipe table with an optional caption.
    Table {
        markdown: String,
        caption: Option<String>,
    },
    Figure(Figure),
}

/// A rendered plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    /// Standalone SVG document.
    pub svg: String,
    /// Plot title, used as alt text when the fragment has no caption.
    pub title: Option<String>,
}

/// A value the renderer knows how to embed. Packages add new result kinds by
/// implementing this trait and returning them as `RuntimeValue::Object`.
pub trait Renderable: fmt::Debug {
    /// Class name reported by `class()`.
    fn type_name(&self) -> &str;

    fn to_narrative(&self) -> Narrative;

    /// Console-style text shown for literal results.
    fn to_literal(&self) -> String;

    /// Text substituted for an inline fragment.
    fn to_inline(&self) -> String {
        match self.to_narrative() {
            Narrative::Markdown(text) => text,
            Narrative::Table { markdown, .. } => markdown,
            Narrative::Figure(figure) => figure.title.unwrap_or_default(),
        }
    }

    /// Results that embed their narrative form even in literal fragments.
    fn is_asis(&self) -> bool {
        false
    }
}
