//! Process-wide settings and the application context.
//!
//! [`AppContext`] owns everything the client keeps locally between runs:
//! settings, the user profile and the download counter. It is loaded once at
//! startup with [`AppContext::load`] and written back with [`AppContext::save`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::carousel::model::{BrandingStyle, SlideNumberStyle};
use crate::error::CarouselResult;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DOWNLOADS_FILE: &str = "downloads.json";
pub const HISTORY_FILE: &str = "history.json";
pub const PROFILE_FILE: &str = "profile.json";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert social media content strategist. \
You write concise, high-engagement carousel slides: a scroll-stopping hook on the first slide, \
one clear idea per slide, and a call to action on the last slide.";

/// Text model used for content, captions, threads and design suggestions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AiModel {
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Flash,
    #[serde(rename = "gemini-3-pro-preview")]
    Pro,
}

impl AiModel {
    /// Model identifier sent to the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::Pro => "gemini-3-pro-preview",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gemini-2.5-flash" | "flash" => Some(Self::Flash),
            "gemini-3-pro-preview" | "pro" => Some(Self::Pro),
            _ => None,
        }
    }
}

// =============================================================================
// BRAND KIT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrandColors {
    pub primary: String,
    pub secondary: String,
    pub text: String,
}

impl Default for BrandColors {
    fn default() -> Self {
        Self {
            primary: "#FFFFFF".to_string(),
            secondary: "#00C2CB".to_string(),
            text: "#111827".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrandFonts {
    pub headline: String,
    pub body: String,
}

impl Default for BrandFonts {
    fn default() -> Self {
        Self {
            headline: "Inter".to_string(),
            body: "Inter".to_string(),
        }
    }
}

/// Reusable colors, fonts and branding applied to a carousel in one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct BrandKit {
    pub colors: BrandColors,
    pub fonts: BrandFonts,
    /// Logo as a data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub branding_text: String,
    pub branding_style: BrandingStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number_style: Option<SlideNumberStyle>,
}

// =============================================================================
// SETTINGS AND PROFILE
// =============================================================================

/// User-level settings. Missing fields fill from defaults, nested brand kit
/// fields included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub ai_model: AiModel,
    pub api_key: String,
    pub system_prompt: String,
    pub brand_kit: Option<BrandKit>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ai_model: AiModel::default(),
            api_key: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            brand_kit: Some(BrandKit::default()),
        }
    }
}

impl AppSettings {
    /// Builder: Set API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Builder: Set model.
    pub fn with_ai_model(mut self, model: AiModel) -> Self {
        self.ai_model = model;
        self
    }

    /// True if an API key has been entered.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Profile fields the pipeline reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub niche: Vec<String>,
}

impl UserProfile {
    /// First non-blank niche, if any.
    pub fn primary_niche(&self) -> Option<&str> {
        self.niche
            .iter()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
    }
}

// =============================================================================
// APPLICATION CONTEXT
// =============================================================================

/// Locally persisted client state.
#[derive(Debug, Clone)]
pub struct AppContext {
    dir: PathBuf,
    pub settings: AppSettings,
    pub profile: UserProfile,
    download_count: u64,
}

impl AppContext {
    /// Loads state from `dir`, creating the directory if needed.
    ///
    /// Missing files yield defaults. Unreadable or corrupt files also yield
    /// defaults, with a warning.
    pub fn load(dir: impl Into<PathBuf>) -> CarouselResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let context = Self {
            settings: read_json_or_default(&dir.join(SETTINGS_FILE)),
            profile: read_json_or_default(&dir.join(PROFILE_FILE)),
            download_count: read_json_or_default(&dir.join(DOWNLOADS_FILE)),
            dir,
        };
        debug!(dir = %context.dir.display(), downloads = context.download_count, "loaded app context");
        Ok(context)
    }

    /// Writes settings, profile and the download counter back to disk.
    pub fn save(&self) -> CarouselResult<()> {
        write_json(&self.dir.join(SETTINGS_FILE), &self.settings)?;
        write_json(&self.dir.join(PROFILE_FILE), &self.profile)?;
        write_json(&self.dir.join(DOWNLOADS_FILE), &self.download_count)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the local carousel store.
    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn download_count(&self) -> u64 {
        self.download_count
    }

    /// Increments the download counter and persists it immediately.
    pub fn record_download(&mut self) -> CarouselResult<u64> {
        self.download_count += 1;
        write_json(&self.dir.join(DOWNLOADS_FILE), &self.download_count)?;
        Ok(self.download_count)
    }
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read file, using defaults");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "could not parse file, using defaults");
        T::default()
    })
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CarouselResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
