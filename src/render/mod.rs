//! Preview Rendering
//!
//! Maps render tree node kinds to HTML through a fixed table. Pure
//! presentation: no scripting, no component registry.

pub mod html;
pub mod placeholder;

use serde::{Deserialize, Serialize};

pub use html::{is_safe_href, is_valid_source, render_error, render_html};

/// Preview color theme
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// CSS class applied to the preview container
    pub fn class_name(self) -> &'static str {
        match self {
            Theme::Light => "theme-light",
            Theme::Dark => "theme-dark",
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" | "vs" | "vs-light" => Ok(Theme::Light),
            "dark" | "vs-dark" => Ok(Theme::Dark),
            other => Err(anyhow::anyhow!("Unknown theme: {}", other)),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
