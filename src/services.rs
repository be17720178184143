//! Suivi des traitements: point d'entrée unique pour créer, lire et faire avancer
//! les plans de traitement enregistrés sur l'appareil.
//!
//! Chaque opération modifiante prend `&mut self`: un hôte multi-thread doit placer
//! le tracker derrière un unique `Mutex` pour que les lectures-modifications-écritures
//! ne s'entrelacent pas.
use crate::config::{DIAGNOSIS_KEY, FERTILIZER_SEARCH_KEY, IMAGE_KEY, TREATMENTS_KEY};
use crate::db::{Storage, StorageError};
use crate::models::{
    DiagnosisResult, StepTemplate, Treatment, TreatmentID, TreatmentStatus,
};
use crate::recommendations::Fertilizer;
use crate::utils::input_validation::{ImageRef, InvalidInput};
use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Traitement inexistant: {0}")]
    TreatmentNotFound(TreatmentID),

    #[error("Étape {step} inexistante pour le traitement {treatment}")]
    StepNotFound { treatment: TreatmentID, step: u32 },

    #[error(transparent)]
    StorageUnavailable(#[from] StorageError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

impl TrackerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TrackerError::TreatmentNotFound(_) | TrackerError::StepNotFound { .. }
        )
    }
}

/// Le dernier diagnostic enregistré et son image éventuelle
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisSnapshot {
    pub diagnosis: DiagnosisResult,
    pub image: Option<ImageRef>,
}

pub struct TreatmentTracker<S: Storage> {
    storage: S,
}

impl<S: Storage> TreatmentTracker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Enregistre le résultat d'un diagnostic (côté producteur).
    /// Une image absente efface celle du diagnostic précédent.
    /// Si le diagnostic ne peut pas être écrit, l'image précédente est remise en place.
    pub fn record_diagnosis(
        &mut self,
        diagnosis: &DiagnosisResult,
        image: Option<&ImageRef>,
    ) -> Result<(), TrackerError> {
        let previous_image = self.storage.get(IMAGE_KEY)?.unwrap_or(Value::Null);
        self.storage.store(IMAGE_KEY, &image)?;

        if let Err(e) = self.storage.store(DIAGNOSIS_KEY, diagnosis) {
            warn!("Could not save diagnosis {}: {e}", diagnosis.disease);
            if let Err(restore) = self.storage.set(IMAGE_KEY, previous_image) {
                error!("Could not restore previous image: {restore}");
            }
            return Err(e.into());
        }

        info!("Diagnosis recorded: {}", diagnosis.disease);
        Ok(())
    }

    /// Lit le dernier diagnostic. L'absence de diagnostic n'est pas une erreur.
    pub fn latest_diagnosis(&self) -> Result<Option<DiagnosisSnapshot>, TrackerError> {
        let Some(diagnosis) = self.storage.load::<DiagnosisResult>(DIAGNOSIS_KEY)? else {
            return Ok(None);
        };
        let image = self.storage.load::<ImageRef>(IMAGE_KEY)?;
        Ok(Some(DiagnosisSnapshot { diagnosis, image }))
    }

    /// Crée un traitement à partir d'un diagnostic et l'ajoute à la fin de la liste.
    /// Si l'écriture échoue, la liste enregistrée n'est pas modifiée.
    pub fn create_treatment(
        &mut self,
        diagnosis: &DiagnosisResult,
        image: Option<ImageRef>,
        template: &[StepTemplate],
    ) -> Result<Treatment, TrackerError> {
        let existing = self.load_treatments()?;

        let id = loop {
            let candidate = TreatmentID::new();
            if existing.iter().all(|t| t.id != candidate) {
                break candidate;
            }
        };

        let treatment = Treatment::new(id, diagnosis, image, template, Utc::now())?;

        self.storage.append_item(TREATMENTS_KEY, &treatment)?;

        info!(
            "Treatment {} created for {} ({} steps)",
            treatment.id,
            treatment.disease,
            treatment.steps.len()
        );
        Ok(treatment)
    }

    /// Crée un traitement à partir du dernier diagnostic enregistré
    pub fn save_latest_diagnosis(
        &mut self,
        template: &[StepTemplate],
    ) -> Result<Treatment, TrackerError> {
        let DiagnosisSnapshot { diagnosis, image } = self
            .latest_diagnosis()?
            .ok_or(InvalidInput("aucun diagnostic enregistré"))?;

        self.create_treatment(&diagnosis, image, template)
    }

    /// Retient l'engrais choisi pour la recherche en boutique et retourne le terme cherché.
    /// Un produit en rupture de stock ne peut pas être commandé.
    pub fn record_fertilizer_search(
        &mut self,
        fertilizer: &Fertilizer,
    ) -> Result<String, TrackerError> {
        if !fertilizer.in_stock {
            return Err(InvalidInput("produit en rupture de stock").into());
        }
        self.storage.store(FERTILIZER_SEARCH_KEY, &fertilizer.name)?;
        info!("Fertilizer search recorded: {}", fertilizer.name);
        Ok(fertilizer.name.to_owned())
    }

    /// Dernier engrais recherché, s'il y en a un
    pub fn fertilizer_search(&self) -> Result<Option<String>, TrackerError> {
        Ok(self.storage.load::<String>(FERTILIZER_SEARCH_KEY)?)
    }

    /// Tous les traitements, dans l'ordre de création
    pub fn list_treatments(&self) -> Result<Vec<Treatment>, TrackerError> {
        self.load_treatments()
    }

    /// Les traitements encore en cours, dans l'ordre de création
    pub fn active_treatments(&self) -> Result<Vec<Treatment>, TrackerError> {
        Ok(self
            .load_treatments()?
            .into_iter()
            .filter(|t| t.status == TreatmentStatus::Active)
            .collect())
    }

    pub fn get_treatment(&self, id: TreatmentID) -> Result<Treatment, TrackerError> {
        self.load_treatments()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(TrackerError::TreatmentNotFound(id))
    }

    /// Marque une étape comme faite et recalcule progression, action suivante et statut.
    /// Compléter une étape déjà faite ne change rien.
    pub fn complete_step(&mut self, id: TreatmentID, step: u32) -> Result<Treatment, TrackerError> {
        self.update_treatment(id, |treatment| {
            let changed = treatment
                .complete_step(step)
                .ok_or(TrackerError::StepNotFound { treatment: id, step })?;

            if changed {
                info!(
                    "Step {step} of treatment {id} completed ({}%)",
                    treatment.progress
                );
                if treatment.status == TreatmentStatus::Completed {
                    info!("Treatment {id} completed");
                }
            }
            Ok(changed)
        })
    }

    /// Abandonne un traitement en cours
    pub fn abandon_treatment(&mut self, id: TreatmentID) -> Result<Treatment, TrackerError> {
        self.update_treatment(id, |treatment| {
            let changed = treatment.abandon()?;
            if changed {
                info!("Treatment {id} abandoned");
            }
            Ok(changed)
        })
    }

    fn load_treatments(&self) -> Result<Vec<Treatment>, TrackerError> {
        Ok(self
            .storage
            .load::<Vec<Treatment>>(TREATMENTS_KEY)?
            .unwrap_or_default())
    }

    /// Cherche un traitement, applique `update`, et réécrit la liste seulement
    /// si `update` signale un changement.
    fn update_treatment<F>(&mut self, id: TreatmentID, update: F) -> Result<Treatment, TrackerError>
    where
        F: FnOnce(&mut Treatment) -> Result<bool, TrackerError>,
    {
        let mut treatments = self.load_treatments()?;
        let treatment = treatments
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TrackerError::TreatmentNotFound(id))?;

        let changed = update(treatment)?;
        let updated = treatment.clone();

        if changed {
            if let Err(e) = self.storage.store(TREATMENTS_KEY, &treatments) {
                warn!("Could not save treatment {id}: {e}");
                return Err(e.into());
            }
        }
        Ok(updated)
    }
}
