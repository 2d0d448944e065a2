use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Social login provider. `(social_id, provider)` is the unique member key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Kakao,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Kakao => "kakao",
        }
    }
}

impl FromStr for Provider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "kakao" => Ok(Self::Kakao),
            other => Err(UnknownVariant::new("provider", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// Space category, also usable as a member's favorite category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    EnterArt,
    KnowledgeIssue,
    LifeKnowhow,
    HobbyLeisure,
    HomeOffice,
    Etc,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnterArt => "enter_art",
            Self::KnowledgeIssue => "knowledge_issue",
            Self::LifeKnowhow => "life_knowhow",
            Self::HobbyLeisure => "hobby_leisure",
            Self::HomeOffice => "home_office",
            Self::Etc => "etc",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enter_art" => Ok(Self::EnterArt),
            "knowledge_issue" => Ok(Self::KnowledgeIssue),
            "life_knowhow" => Ok(Self::LifeKnowhow),
            "hobby_leisure" => Ok(Self::HobbyLeisure),
            "home_office" => Ok(Self::HomeOffice),
            "etc" => Ok(Self::Etc),
            other => Err(UnknownVariant::new("category", other)),
        }
    }
}

/// The fixed 8-color tag palette. Anything else is rejected at the seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Indigo,
    Purple,
    Gray,
}

impl TagColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Indigo => "indigo",
            Self::Purple => "purple",
            Self::Gray => "gray",
        }
    }
}

impl FromStr for TagColor {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Self::Red),
            "orange" => Ok(Self::Orange),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            "blue" => Ok(Self::Blue),
            "indigo" => Ok(Self::Indigo),
            "purple" => Ok(Self::Purple),
            "gray" => Ok(Self::Gray),
            other => Err(UnknownVariant::new("tag color", other)),
        }
    }
}

/// A string that does not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}
