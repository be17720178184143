//! Modèle de données: diagnostics, traitements et leurs étapes

use chrono::{DateTime, Duration, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;
use uuid::Uuid;

use crate::config::{COMPLETE_ACTION, NO_STEPS_ACTION};
use crate::utils::input_validation::{Confidence, DiseaseName, ImageRef, InvalidInput};

/// Sévérité d'une maladie, telle qu'estimée par le diagnostic
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[display("low")]
    Low,
    #[display("medium")]
    Medium,
    #[display("high")]
    High,
}

impl Severity {
    /// Libellé affiché sur l'écran de résultats (`HIGH`, ...)
    pub fn label(self) -> String {
        self.to_string().to_uppercase()
    }
}

/// Le résultat d'une classification, produit en amont. Jamais modifié.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub disease: DiseaseName,
    pub confidence: Confidence,
    pub affected_area: String,
    pub stage: String,
    pub severity: Severity,
    pub detected_date: DateTime<Utc>,
}

/// Un identifiant unique de traitement
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Display,
)]
pub struct TreatmentID(Uuid);

impl TreatmentID {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TreatmentID {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum TreatmentStatus {
    #[display("active")]
    Active,
    #[display("completed")]
    Completed,
    #[display("abandoned")]
    Abandoned,
}

/// Une entrée de modèle d'étapes: un titre, un conseil et un délai depuis le début du traitement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTemplate {
    pub title: String,
    pub description: Option<String>,
    pub due_offset: Duration,
}

impl StepTemplate {
    pub fn new(title: impl Into<String>, due_offset: Duration) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_offset,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Le modèle par défaut, appliqué à tout diagnostic
pub fn default_template() -> Vec<StepTemplate> {
    vec![
        StepTemplate::new("Remove Affected Parts", Duration::zero()).with_description(
            "Carefully remove all affected leaves and stems. Dispose away from healthy plants.",
        ),
        StepTemplate::new("Apply Copper Fungicide", Duration::days(1)).with_description(
            "Spray in early morning or evening. Repeat every 7-10 days for 3 applications.",
        ),
        StepTemplate::new("Improve Air Circulation", Duration::days(2)).with_description(
            "Space plants properly and avoid overhead watering to prevent reinfection.",
        ),
        StepTemplate::new("Monitor Progress", Duration::days(7)).with_description(
            "Check daily for new symptoms. Recovery should begin within 5-7 days.",
        ),
    ]
}

/// Un modèle est utilisable s'il a au moins une étape, des titres non vides,
/// et des délais positifs et croissants.
pub fn validate_template(template: &[StepTemplate]) -> Result<(), InvalidInput> {
    if template.is_empty() {
        return Err(InvalidInput("modèle d'étapes vide"));
    }
    if template.iter().any(|entry| entry.title.trim().is_empty()) {
        return Err(InvalidInput("titre d'étape vide"));
    }
    if template.iter().any(|entry| entry.due_offset < Duration::zero()) {
        return Err(InvalidInput("délai d'étape négatif"));
    }
    if template
        .windows(2)
        .any(|pair| pair[1].due_offset < pair[0].due_offset)
    {
        return Err(InvalidInput("délais d'étapes non croissants"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "camelCase")]
#[display("{step}. {title}")]
pub struct TreatmentStep {
    /// Position de l'étape, à partir de 1
    pub step: u32,
    pub title: String,
    pub completed: bool,
    pub due_date: DateTime<Utc>,
}

/// Un plan de traitement suivi par l'utilisateur.
///
/// `progress` et `next_action` sont dérivés des étapes; ils ne sont jamais
/// écrits directement, seulement recalculés par [`Treatment::refresh`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Display)]
#[serde(rename_all = "camelCase")]
#[display("{disease} ({status}, {progress}%)")]
pub struct Treatment {
    pub id: TreatmentID,
    pub disease: DiseaseName,
    pub start_date: DateTime<Utc>,
    pub status: TreatmentStatus,
    pub progress: u8,
    pub next_action: String,
    pub image: Option<ImageRef>,
    pub severity: Severity,
    pub confidence: Confidence,
    pub steps: Vec<TreatmentStep>,
}

impl Treatment {
    /// Construit un traitement complet à partir d'un instantané de diagnostic.
    /// Rien n'est construit si le modèle est invalide.
    pub fn new(
        id: TreatmentID,
        diagnosis: &DiagnosisResult,
        image: Option<ImageRef>,
        template: &[StepTemplate],
        start_date: DateTime<Utc>,
    ) -> Result<Self, InvalidInput> {
        validate_template(template)?;

        let steps = template
            .iter()
            .zip(1..)
            .map(|(entry, step)| {
                let due_date = start_date
                    .checked_add_signed(entry.due_offset)
                    .ok_or(InvalidInput("délai d'étape trop grand"))?;
                Ok(TreatmentStep {
                    step,
                    title: entry.title.clone(),
                    completed: false,
                    due_date,
                })
            })
            .collect::<Result<Vec<_>, InvalidInput>>()?;

        let mut treatment = Self {
            id,
            disease: diagnosis.disease.clone(),
            start_date,
            status: TreatmentStatus::Active,
            progress: 0,
            next_action: String::new(),
            image,
            severity: diagnosis.severity,
            confidence: diagnosis.confidence,
            steps,
        };
        treatment.refresh();
        Ok(treatment)
    }

    pub fn step(&self, step: u32) -> Option<&TreatmentStep> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }

    pub fn is_finished(&self) -> bool {
        !self.steps.is_empty() && self.completed_steps() == self.steps.len()
    }

    /// Marque une étape comme faite. Retourne `None` si l'étape n'existe pas,
    /// sinon `Some(changed)`; une étape déjà faite n'est pas modifiée.
    pub fn complete_step(&mut self, step: u32) -> Option<bool> {
        let target = self.steps.iter_mut().find(|s| s.step == step)?;
        if target.completed {
            return Some(false);
        }
        target.completed = true;
        self.refresh();
        Some(true)
    }

    /// Abandonne un traitement actif. Un traitement terminé ne peut pas l'être.
    pub fn abandon(&mut self) -> Result<bool, InvalidInput> {
        match self.status {
            TreatmentStatus::Active => {
                self.status = TreatmentStatus::Abandoned;
                Ok(true)
            }
            TreatmentStatus::Abandoned => Ok(false),
            TreatmentStatus::Completed => Err(InvalidInput("traitement déjà terminé")),
        }
    }

    /// Recalcule les champs dérivés. Seul le passage actif -> terminé est automatique.
    pub fn refresh(&mut self) {
        self.progress = progress_of(&self.steps);
        self.next_action = next_action_of(&self.steps);
        if self.status == TreatmentStatus::Active && self.is_finished() {
            self.status = TreatmentStatus::Completed;
        }
    }
}

/// round(100 * faites / total), 0 pour une liste vide
pub fn progress_of(steps: &[TreatmentStep]) -> u8 {
    if steps.is_empty() {
        return 0;
    }
    let done = steps.iter().filter(|s| s.completed).count();
    (100.0 * done as f64 / steps.len() as f64).round() as u8
}

/// Titre de la plus petite étape non faite
pub fn next_action_of(steps: &[TreatmentStep]) -> String {
    if steps.is_empty() {
        return NO_STEPS_ACTION.to_owned();
    }
    steps
        .iter()
        .filter(|s| !s.completed)
        .min_by_key(|s| s.step)
        .map(|s| s.title.clone())
        .unwrap_or_else(|| COMPLETE_ACTION.to_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn late_blight() -> DiagnosisResult {
        DiagnosisResult {
            disease: DiseaseName::try_from("Late Blight").unwrap(),
            confidence: Confidence::try_from(87.0).unwrap(),
            affected_area: "Leaves".into(),
            stage: "Early".into(),
            severity: Severity::High,
            detected_date: "2024-01-01T00:00:00Z".parse().unwrap(),
        }
    }

    fn new_treatment() -> Treatment {
        Treatment::new(
            TreatmentID::new(),
            &late_blight(),
            None,
            &default_template(),
            Utc::now(),
        )
        .unwrap()
    }

    fn step(step: u32, completed: bool) -> TreatmentStep {
        TreatmentStep {
            step,
            title: format!("Step {step}"),
            completed,
            due_date: Utc::now(),
        }
    }

    mod creation_tests {
        use super::*;

        #[test]
        fn test_steps_follow_template() {
            let treatment = new_treatment();
            let ordinals: Vec<u32> = treatment.steps.iter().map(|s| s.step).collect();
            assert_eq!(ordinals, vec![1, 2, 3, 4]);

            assert!(treatment
                .steps
                .windows(2)
                .all(|pair| pair[0].due_date <= pair[1].due_date));

            assert_eq!(treatment.steps[0].due_date, treatment.start_date);
            assert_eq!(
                treatment.steps[1].due_date,
                treatment.start_date + Duration::days(1)
            );
            assert_eq!(
                treatment.steps[3].due_date,
                treatment.start_date + Duration::days(7)
            );
        }

        #[test]
        fn test_fields_copied_from_diagnosis() {
            let diagnosis = late_blight();
            let treatment = new_treatment();

            assert_eq!(treatment.disease, diagnosis.disease);
            assert_eq!(treatment.severity, Severity::High);
            assert_eq!(treatment.confidence, diagnosis.confidence);
            assert_eq!(treatment.status, TreatmentStatus::Active);
            assert_eq!(treatment.progress, 0);
            assert_eq!(treatment.next_action, "Remove Affected Parts");
        }

        #[test]
        fn test_invalid_templates() {
            let invalid_cases = vec![
                vec![],
                vec![StepTemplate::new("  ", Duration::zero())],
                vec![StepTemplate::new("Spray", Duration::days(-1))],
                vec![
                    StepTemplate::new("Spray", Duration::days(2)),
                    StepTemplate::new("Prune", Duration::days(1)),
                ],
                vec![StepTemplate::new("Wait", Duration::days(100_000_000))],
            ];

            for template in invalid_cases {
                let result = Treatment::new(
                    TreatmentID::new(),
                    &late_blight(),
                    None,
                    &template,
                    Utc::now(),
                );
                assert!(result.is_err(), "Invalid template {:?} was accepted !", template);
            }
        }

        #[test]
        fn test_default_template_has_advice() {
            assert!(default_template().iter().all(|entry| entry.description.is_some()));
            assert_eq!(
                default_template()[0].description.as_deref(),
                Some("Carefully remove all affected leaves and stems. Dispose away from healthy plants.")
            );
        }

        #[test]
        fn test_serialized_layout() {
            let treatment = new_treatment();
            let json = serde_json::to_value(&treatment).unwrap();

            assert_eq!(json["status"], "active");
            assert_eq!(json["severity"], "high");
            assert_eq!(json["nextAction"], "Remove Affected Parts");
            assert_eq!(json["steps"][1]["step"], 2);
            assert!(json["steps"][1]["dueDate"].is_string());
            assert!(json["image"].is_null());
        }
    }

    mod derivation_tests {
        use super::*;

        #[test]
        fn test_progress_rounding() {
            assert_eq!(progress_of(&[]), 0);
            assert_eq!(progress_of(&[step(1, true), step(2, false), step(3, false)]), 33);
            assert_eq!(progress_of(&[step(1, true), step(2, true), step(3, false)]), 67);
            assert_eq!(progress_of(&[step(1, true), step(2, true)]), 100);

            let mut eight: Vec<TreatmentStep> = (1..=8).map(|n| step(n, false)).collect();
            eight[0].completed = true;
            assert_eq!(progress_of(&eight), 13);
        }

        #[test]
        fn test_next_action() {
            assert_eq!(next_action_of(&[]), NO_STEPS_ACTION);
            assert_eq!(next_action_of(&[step(1, true), step(2, true)]), COMPLETE_ACTION);
            assert_eq!(
                next_action_of(&[step(2, false), step(1, false), step(3, true)]),
                "Step 1"
            );
        }
    }

    mod transition_tests {
        use super::*;

        #[test]
        fn test_complete_step_is_idempotent() {
            let mut treatment = new_treatment();
            assert_eq!(treatment.complete_step(2), Some(true));
            let once = treatment.clone();
            assert_eq!(treatment.complete_step(2), Some(false));
            assert_eq!(treatment, once);
        }

        #[test]
        fn test_unknown_step() {
            let mut treatment = new_treatment();
            assert_eq!(treatment.complete_step(0), None);
            assert_eq!(treatment.complete_step(5), None);
        }

        #[test]
        fn test_completion_changes_status() {
            let mut treatment = new_treatment();
            for n in 1..=4 {
                treatment.complete_step(n);
            }
            assert_eq!(treatment.status, TreatmentStatus::Completed);
            assert_eq!(treatment.progress, 100);
            assert_eq!(treatment.next_action, COMPLETE_ACTION);
        }

        #[test]
        fn test_abandon() {
            let mut treatment = new_treatment();
            assert_eq!(treatment.abandon(), Ok(true));
            assert_eq!(treatment.abandon(), Ok(false));

            // Les étapes restent enregistrables, mais le statut ne change plus
            for n in 1..=4 {
                treatment.complete_step(n);
            }
            assert_eq!(treatment.progress, 100);
            assert_eq!(treatment.status, TreatmentStatus::Abandoned);
        }

        #[test]
        fn test_cannot_abandon_completed() {
            let mut treatment = new_treatment();
            for n in 1..=4 {
                treatment.complete_step(n);
            }
            assert!(treatment.abandon().is_err());
            assert_eq!(treatment.status, TreatmentStatus::Completed);
        }
    }

    #[test]
    fn test_severity_label() {
        assert_eq!(Severity::High.label(), "HIGH");
        assert_eq!(Severity::Low.to_string(), "low");
    }
}
