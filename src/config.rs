//! Constantes globales et configuration de l'application.

use std::{env, path::PathBuf, str::FromStr};

use log::LevelFilter;

pub const DIAGNOSIS_KEY: &str = "diagnosis_results"; // Dernier diagnostic reçu
pub const IMAGE_KEY: &str = "plant_image"; // Image associée au dernier diagnostic
pub const TREATMENTS_KEY: &str = "active_treatments"; // Liste des traitements, dans l'ordre d'ajout
pub const FERTILIZER_SEARCH_KEY: &str = "fertilizer_search"; // Produit cherché en boutique

pub const DEFAULT_DATA_FILE: &str = "kisan.json";
pub const DEFAULT_LOG_FILE: &str = "./kisan.log";

/// Action affichée quand un traitement n'a aucune étape
pub const NO_STEPS_ACTION: &str = "No steps planned";
/// Action affichée quand toutes les étapes sont terminées
pub const COMPLETE_ACTION: &str = "Treatment complete";

const DATA_FILE_VAR: &str = "KISAN_DATA_FILE";
const LOG_FILE_VAR: &str = "KISAN_LOG_FILE";
const LOG_LEVEL_VAR: &str = "KISAN_LOG_LEVEL";
const MARKET_VAR: &str = "KISAN_MARKET";

/// Configuration d'exécution, lue depuis l'environnement (et un éventuel `.env`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_file: PathBuf,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    /// Marché ouvert directement, comme le paramètre d'URL `market`
    pub market: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: DEFAULT_DATA_FILE.into(),
            log_file: DEFAULT_LOG_FILE.into(),
            log_level: LevelFilter::Info,
            market: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Construit la configuration à partir d'une fonction de lecture des variables.
    /// Les valeurs absentes ou invalides retombent sur les valeurs par défaut.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let log_level = lookup(LOG_LEVEL_VAR)
            .and_then(|level| LevelFilter::from_str(level.trim()).ok())
            .unwrap_or(defaults.log_level);

        Self {
            data_file: lookup(DATA_FILE_VAR)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            log_file: lookup(LOG_FILE_VAR)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
            log_level,
            market: lookup(MARKET_VAR).filter(|id| !id.trim().is_empty()),
        }
    }
}
