use chrono::Utc;
use derive_more::derive::Display;
use inquire::{CustomType, Select, Text};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::models::{DiagnosisResult, Severity};

// Regex for disease names, e.g. "Late Blight", "Leaf Spot (Cercospora)"
static DISEASE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}][\p{L}\p{N} '()./,-]{1,79}$").expect("Failed to compile disease regex")
});

// Regex for image references: data URL, remote URL or local image path
static IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^(
            data:image/[a-zA-Z0-9.+-]+;base64,[A-Za-z0-9+/=]+
          | (https?|file)://\S+
          | [^\s]+\.(?i:png|jpe?g|webp|heic)
        )$",
    )
    .expect("Failed to compile image regex")
});

const MAX_FREE_TEXT: usize = 120;

/// Une entrée refusée, avec la raison du refus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Entrée invalide: {0}")]
pub struct InvalidInput(pub &'static str);

/// Une valeur venue d'un producteur externe: non vide, sans caractère de contrôle.
/// Rien d'autre n'est supposé sur son format.
fn opaque_validation(value: &str, what: &'static str) -> Result<(), InvalidInput> {
    if value.trim().is_empty() || value.chars().any(char::is_control) {
        Err(InvalidInput(what))
    } else {
        Ok(())
    }
}

/// Wrapper type for a disease name, as written by the classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(try_from = "String", into = "String")]
pub struct DiseaseName(String);

impl DiseaseName {
    /// Nom saisi à la main: règles plus strictes que pour un libellé du classifieur
    pub fn parse_input(name: &str) -> Result<Self, InvalidInput> {
        let name = name.trim();
        if DISEASE_REGEX.is_match(name) {
            Ok(Self(name.to_owned()))
        } else {
            Err(InvalidInput("nom de maladie"))
        }
    }
}

impl TryFrom<String> for DiseaseName {
    type Error = InvalidInput;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        opaque_validation(&name, "nom de maladie vide")?;
        Ok(Self(name.trim().to_owned()))
    }
}

impl TryFrom<&str> for DiseaseName {
    type Error = InvalidInput;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::try_from(name.to_owned())
    }
}

impl From<DiseaseName> for String {
    fn from(name: DiseaseName) -> Self {
        name.0
    }
}

impl AsRef<str> for DiseaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Un pourcentage de confiance, entre 0 et 100 inclus
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd, Display)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = InvalidInput;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidInput("confiance hors de [0, 100]"))
        }
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

/// Référence opaque vers l'image analysée (data URL, blob, URI de contenu, chemin...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef(String);

impl ImageRef {
    /// Référence saisie à la main: data URL, URL ou chemin vers un fichier image
    pub fn parse_input(value: &str) -> Result<Self, InvalidInput> {
        if IMAGE_REGEX.is_match(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(InvalidInput("référence d'image"))
        }
    }
}

impl TryFrom<String> for ImageRef {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        opaque_validation(&value, "référence d'image vide")?;
        Ok(Self(value))
    }
}

impl TryFrom<&str> for ImageRef {
    type Error = InvalidInput;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<ImageRef> for String {
    fn from(image: ImageRef) -> Self {
        image.0
    }
}

impl AsRef<str> for ImageRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Texte libre court (zone touchée, stade): non vide, sans caractère de contrôle
fn free_text_validation(text: &str) -> Result<String, InvalidInput> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_FREE_TEXT {
        return Err(InvalidInput("texte vide ou trop long"));
    }
    if text.chars().any(char::is_control) {
        return Err(InvalidInput("caractère de contrôle"));
    }
    Ok(text.to_owned())
}

/// Interactively prompts for a diagnosis, as the classifier would have produced it
pub fn diagnosis_input() -> anyhow::Result<DiagnosisResult> {
    let disease = DiseaseName::parse_input(&Text::new("Maladie détectée:").prompt()?)?;

    let confidence = CustomType::<f64>::new("Confiance (0-100):")
        .with_error_message("Entrez un nombre")
        .prompt()?;
    let confidence = Confidence::try_from(confidence)?;

    let affected_area = free_text_validation(&Text::new("Zone touchée:").prompt()?)?;
    let stage = free_text_validation(&Text::new("Stade:").prompt()?)?;
    let severity = Select::new("Sévérité:", Severity::iter().collect()).prompt()?;

    Ok(DiagnosisResult {
        disease,
        confidence,
        affected_area,
        stage,
        severity,
        detected_date: Utc::now(),
    })
}

/// Demande une référence d'image optionnelle. Une entrée vide signifie "pas d'image".
pub fn image_input() -> anyhow::Result<Option<ImageRef>> {
    let raw = Text::new("Image (URL ou chemin, vide si aucune):").prompt()?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(ImageRef::parse_input(raw.trim())?))
}
