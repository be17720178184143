use anyhow::Result;
use chrono::{DateTime, Local};
use derive_more::Display;
use dotenv::dotenv;
use inquire::{Confirm, Select};
use kisan::config::Config;
use kisan::db::JsonFileStorage;
use kisan::market::{Market, MarketFeed, StaticMarketFeed};
use kisan::models::{default_template, Treatment, TreatmentID, TreatmentStatus};
use kisan::recommendations::{Fertilizer, RECOMMENDED_FERTILIZERS, TREATMENT_OUTLOOK};
use kisan::services::{DiagnosisSnapshot, TreatmentTracker};
use kisan::utils::input_validation::{diagnosis_input, image_input};
use log::info;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

type Tracker = TreatmentTracker<JsonFileStorage>;

type MenuExit = Option<()>;
const MENU_EXIT: MenuExit = None;
const MENU_LOOP: MenuExit = Some(());

/// Représente un menu texte
trait Menu {
    /// Implémente le contenu du menu. La valeur de retour
    /// doit être None si le menu souhaite terminer,
    /// ou Some(()) s'il faut le relancer.
    fn enter(&mut self) -> Result<Option<()>>;

    /// Lance le menu en boucle, en interceptant les erreurs,
    /// sauf si le menu souhaite quitter.
    fn enter_loop(&mut self) {
        while let Some(result) = self.enter().transpose() {
            if let Err(error) = result {
                eprintln!("Erreur: {error}");
            }
        }
    }
}

/// Écran vers lequel renvoyer l'utilisateur après une action
enum Navigation {
    Treatments,
    NewDiagnosis,
}

pub struct App {
    tracker: Tracker,
    feed: StaticMarketFeed,
    market: Option<String>,
}

impl App {
    pub fn new(tracker: Tracker, feed: StaticMarketFeed, market: Option<String>) -> Self {
        App {
            tracker,
            feed,
            market,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        println!("Bienvenue sur KISAN, le suivi de santé de vos cultures.");
        self.enter_loop();
        Ok(())
    }

    fn navigate(&mut self, target: Navigation) -> Result<()> {
        match target {
            Navigation::Treatments => TreatmentsMenu {
                tracker: &mut self.tracker,
            }
            .enter_loop(),
            Navigation::NewDiagnosis => {
                let diagnosis = diagnosis_input()?;
                let image = image_input()?;
                self.tracker.record_diagnosis(&diagnosis, image.as_ref())?;
                println!("[*] Diagnostic enregistré.");
            }
        }
        Ok(())
    }
}

impl Menu for App {
    fn enter(&mut self) -> Result<MenuExit> {
        #[derive(EnumIter, Display)]
        enum Choice {
            #[display("Résultats du diagnostic")]
            Results,
            #[display("Enregistrer un diagnostic")]
            Diagnose,
            #[display("Mes traitements")]
            Treatments,
            #[display("Prix du marché")]
            Markets,
            #[display("Quitter")]
            Exit,
        }

        let choice = Select::new("Que voulez-vous faire ?", Choice::iter().collect()).prompt()?;

        match choice {
            Choice::Results => {
                let target = ResultsScreen {
                    tracker: &mut self.tracker,
                }
                .show()?;

                if let Some(target) = target {
                    self.navigate(target)?;
                }
            }
            Choice::Diagnose => self.navigate(Navigation::NewDiagnosis)?,
            Choice::Treatments => self.navigate(Navigation::Treatments)?,
            Choice::Markets => match self.market.as_deref() {
                Some(param) => {
                    let market = self.feed.market_by_param(Some(param))?;
                    MarketScreen::new(&self.feed, market.id).enter_loop();
                }
                None => MarketsMenu { feed: &self.feed }.enter_loop(),
            },
            Choice::Exit => return Ok(MENU_EXIT),
        }
        Ok(MENU_LOOP)
    }
}

/// Affiche le dernier diagnostic et propose d'en faire un plan de traitement
struct ResultsScreen<'trk> {
    tracker: &'trk mut Tracker,
}

impl ResultsScreen<'_> {
    fn show(&mut self) -> Result<Option<Navigation>> {
        let Some(DiagnosisSnapshot { diagnosis, image }) = self.tracker.latest_diagnosis()? else {
            println!("[!] No Results Found. Please diagnose a plant first.");
            let start = Confirm::new("Lancer un diagnostic ?")
                .with_default(true)
                .prompt()?;
            return Ok(start.then_some(Navigation::NewDiagnosis));
        };

        println!(
            "\nDiagnosis Complete - analyzed on {}",
            diagnosis.detected_date.with_timezone(&Local).format("%d/%m/%Y")
        );
        if let Some(image) = &image {
            println!("Image: {}", abbreviate(image.as_ref(), 60));
        }
        println!(
            "\n{}\n{}% Match [{}]\nAffected Area: {}\nStage: {}",
            diagnosis.disease,
            diagnosis.confidence,
            diagnosis.severity.label(),
            diagnosis.affected_area,
            diagnosis.stage
        );

        println!(
            "\nTreatment Timeline\nRecovery Duration: {}\nSuccess Rate: {}% farmers recovered\nBest Treatment Time: {}",
            TREATMENT_OUTLOOK.recovery_duration,
            TREATMENT_OUTLOOK.success_rate,
            TREATMENT_OUTLOOK.best_time
        );

        println!("\nTreatment Steps");
        for (n, entry) in default_template().iter().enumerate() {
            println!("{}. {}", n + 1, entry.title);
            if let Some(description) = &entry.description {
                println!("   {description}");
            }
        }

        println!("\nRecommended Fertilizers");
        for fertilizer in RECOMMENDED_FERTILIZERS {
            println!(
                "- {fertilizer} [{}] -> {}",
                fertilizer.availability(),
                fertilizer.action_label()
            );
        }

        let in_stock: Vec<Fertilizer> = RECOMMENDED_FERTILIZERS
            .into_iter()
            .filter(|f| f.in_stock)
            .collect();
        if let Some(fertilizer) =
            Select::new("Commander un produit ? (Échap pour passer)", in_stock).prompt_skippable()?
        {
            let query = self.tracker.record_fertilizer_search(&fertilizer)?;
            println!("[*] Recherche en boutique: {query}");
        }

        let save = Confirm::new("Save to My Treatments ?")
            .with_default(false)
            .prompt()?;
        if !save {
            return Ok(None);
        }

        let treatment = self.tracker.save_latest_diagnosis(&default_template())?;
        println!("✅ Treatment Saved! Added to your active treatments with step-by-step guidance.");
        info!("Treatment {} saved from latest diagnosis", treatment.id);
        Ok(Some(Navigation::Treatments))
    }
}

struct TreatmentsMenu<'trk> {
    tracker: &'trk mut Tracker,
}

impl Menu for TreatmentsMenu<'_> {
    fn enter(&mut self) -> Result<Option<()>> {
        let treatments = self.tracker.list_treatments()?;

        if treatments.is_empty() {
            println!("[*] Aucun traitement enregistré");
            return Ok(MENU_EXIT);
        }

        let Some(treatment) =
            Select::new("Choisissez un traitement:", treatments).prompt_skippable()?
        else {
            return Ok(MENU_EXIT);
        };

        TreatmentMenu {
            tracker: self.tracker,
            id: treatment.id,
        }
        .enter_loop();
        Ok(MENU_LOOP)
    }
}

struct TreatmentMenu<'trk> {
    tracker: &'trk mut Tracker,
    id: TreatmentID,
}

impl Menu for TreatmentMenu<'_> {
    fn enter(&mut self) -> Result<Option<()>> {
        #[derive(EnumIter, Display)]
        enum Choice {
            #[display("Terminer une étape")]
            CompleteStep,
            #[display("Abandonner ce traitement")]
            Abandon,
            #[display("Retour")]
            Back,
        }

        let treatment = self.tracker.get_treatment(self.id)?;
        print_treatment(&treatment);

        let choice = Select::new("Que voulez-vous faire ?", Choice::iter().collect()).prompt()?;
        match choice {
            Choice::CompleteStep => {
                let pending: Vec<_> = treatment
                    .steps
                    .into_iter()
                    .filter(|s| !s.completed)
                    .collect();
                if pending.is_empty() {
                    println!("[*] Toutes les étapes sont terminées");
                    return Ok(MENU_LOOP);
                }

                if let Some(step) = Select::new("Étape terminée:", pending).prompt_skippable()? {
                    let updated = self.tracker.complete_step(self.id, step.step)?;
                    if updated.status == TreatmentStatus::Completed {
                        println!("🎉 Traitement terminé !");
                    }
                }
            }
            Choice::Abandon => {
                if Confirm::new("Abandonner ce traitement ?")
                    .with_default(false)
                    .prompt()?
                {
                    self.tracker.abandon_treatment(self.id)?;
                }
            }
            Choice::Back => return Ok(MENU_EXIT),
        }
        Ok(MENU_LOOP)
    }
}

fn print_treatment(treatment: &Treatment) {
    println!(
        "\n[{}]\n{} - {} ({}% confidence)\nStatus: {}\nProgress: {}%\nNext action: {}",
        treatment.id,
        treatment.disease,
        treatment.severity.label(),
        treatment.confidence,
        treatment.status,
        treatment.progress,
        treatment.next_action
    );
    for step in &treatment.steps {
        let mark = if step.completed { "x" } else { " " };
        println!(
            "  [{mark}] {step} (due {})",
            step.due_date.with_timezone(&Local).format("%d/%m/%Y")
        );
    }
    println!("===============");
}

struct MarketsMenu<'feed> {
    feed: &'feed StaticMarketFeed,
}

impl Menu for MarketsMenu<'_> {
    fn enter(&mut self) -> Result<Option<()>> {
        let markets: Vec<&Market> = self.feed.markets().iter().collect();

        let Some(market) = Select::new("Choisissez un marché:", markets).prompt_skippable()? else {
            return Ok(MENU_EXIT);
        };

        MarketScreen::new(self.feed, market.id).enter_loop();
        Ok(MENU_LOOP)
    }
}

struct MarketScreen<'feed> {
    feed: &'feed StaticMarketFeed,
    id: u32,
    last_updated: DateTime<Local>,
}

impl<'feed> MarketScreen<'feed> {
    fn new(feed: &'feed StaticMarketFeed, id: u32) -> Self {
        MarketScreen {
            feed,
            id,
            last_updated: Local::now(),
        }
    }
}

impl Menu for MarketScreen<'_> {
    fn enter(&mut self) -> Result<Option<()>> {
        #[derive(EnumIter, Display)]
        enum Choice {
            #[display("Rafraîchir")]
            Refresh,
            #[display("Retour")]
            Back,
        }

        let market = self.feed.market(self.id)?;
        println!(
            "\n{market}\nUpdated: {}\nAll Crop Prices ({} items)",
            self.last_updated.format("%H:%M:%S"),
            market.crops.len()
        );
        for crop in &market.crops {
            println!("  {crop}");
        }

        match Select::new("", Choice::iter().collect()).prompt()? {
            Choice::Refresh => {
                self.last_updated = Local::now();
                Ok(MENU_LOOP)
            }
            Choice::Back => Ok(MENU_EXIT),
        }
    }
}

/// Raccourcit les références longues (data URL) pour l'affichage
fn abbreviate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}…")
}

fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement
    dotenv().ok();
    let config = Config::from_env();

    simple_logging::log_to_file(&config.log_file, config.log_level)?;

    let storage = JsonFileStorage::open(config.data_file)?;
    App::new(
        TreatmentTracker::new(storage),
        StaticMarketFeed::default(),
        config.market,
    )
    .start()
}
