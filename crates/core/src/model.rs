#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageType {
    Note,
    Npc,
    Character,
    Location,
    Arc,
    Tool,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Npc => "npc",
            Self::Character => "character",
            Self::Location => "location",
            Self::Arc => "arc",
            Self::Tool => "tool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(Self::Note),
            "npc" => Some(Self::Npc),
            "character" => Some(Self::Character),
            "location" => Some(Self::Location),
            "arc" => Some(Self::Arc),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockType {
    Section,
    Heading,
    Paragraph,
    Quote,
    Divider,
    Image,
}

impl BlockType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Quote => "quote",
            Self::Divider => "divider",
            Self::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "section" => Some(Self::Section),
            "heading" => Some(Self::Heading),
            "paragraph" => Some(Self::Paragraph),
            "quote" => Some(Self::Quote),
            "divider" => Some(Self::Divider),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}
