//! Prix des produits agricoles par marché (mandi), fournis en lecture seule

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marché affiché quand aucun identifiant n'est donné
pub const DEFAULT_MARKET_ID: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarketError {
    #[error("Marché introuvable: {0}")]
    NotFound(String),
}

/// Évolution d'un prix depuis le relevé précédent
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
    #[display("stable")]
    Stable,
}

impl Trend {
    pub fn symbol(self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Stable => "●",
        }
    }
}

/// Un relevé de prix. Les prix restent des chaînes avec devise et unité (`₹16/kg`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "camelCase")]
#[display("{name}: {price} {} {change} (previous: {previous_price})", trend.symbol())]
pub struct CropPrice {
    pub name: String,
    pub price: String,
    pub change: String,
    pub trend: Trend,
    pub previous_price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display)]
#[display("{name} ({location} • {distance})")]
pub struct Market {
    pub id: u32,
    pub name: String,
    pub location: String,
    pub distance: String,
    pub crops: Vec<CropPrice>,
}

/// Source des prix de marché
pub trait MarketFeed {
    fn markets(&self) -> &[Market];

    fn market(&self, id: u32) -> Result<&Market, MarketError> {
        self.markets()
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| MarketError::NotFound(id.to_string()))
    }

    /// Résout un paramètre de route: absent -> marché par défaut, non numérique -> introuvable
    fn market_by_param(&self, param: Option<&str>) -> Result<&Market, MarketError> {
        let id = match param.map(str::trim) {
            None | Some("") => DEFAULT_MARKET_ID,
            Some(raw) => raw
                .parse()
                .map_err(|_| MarketError::NotFound(raw.to_owned()))?,
        };
        self.market(id)
    }
}

/// Données fixes des marchés de Delhi
pub struct StaticMarketFeed {
    markets: Vec<Market>,
}

impl Default for StaticMarketFeed {
    fn default() -> Self {
        use Trend::*;

        Self {
            markets: vec![
                market(1, "Azadpur Mandi", "Delhi", "12 km", &[
                    ("Tomato", "₹16/kg", "+8%", Up, "₹14.80/kg"),
                    ("Onion", "₹25/kg", "+12%", Up, "₹22.30/kg"),
                    ("Potato", "₹18/kg", "-5%", Down, "₹19/kg"),
                    ("Carrot", "₹22/kg", "+3%", Up, "₹21.30/kg"),
                    ("Cabbage", "₹12/kg", "0%", Stable, "₹12/kg"),
                    ("Cauliflower", "₹20/kg", "+15%", Up, "₹17.40/kg"),
                    ("Spinach", "₹18/kg", "-2%", Down, "₹18.40/kg"),
                    ("Brinjal", "₹24/kg", "+7%", Up, "₹22.40/kg"),
                    ("Okra", "₹35/kg", "+10%", Up, "₹31.80/kg"),
                    ("Green Beans", "₹45/kg", "-3%", Down, "₹46.40/kg"),
                ]),
                market(2, "Ghazipur Mandi", "Delhi", "18 km", &[
                    ("Wheat", "₹2,150/qtl", "+2%", Up, "₹2,105/qtl"),
                    ("Paddy", "₹1,850/qtl", "-3%", Down, "₹1,907/qtl"),
                    ("Mustard", "₹4,200/qtl", "+5%", Up, "₹4,000/qtl"),
                    ("Gram", "₹3,800/qtl", "+1%", Up, "₹3,762/qtl"),
                    ("Barley", "₹1,650/qtl", "+4%", Up, "₹1,587/qtl"),
                    ("Maize", "₹1,420/qtl", "-1%", Down, "₹1,434/qtl"),
                    ("Bajra", "₹1,380/qtl", "+3%", Up, "₹1,340/qtl"),
                    ("Jowar", "₹1,250/qtl", "+2%", Up, "₹1,225/qtl"),
                ]),
                market(3, "Najafgarh Mandi", "Delhi", "25 km", &[
                    ("Cauliflower", "₹15/kg", "+10%", Up, "₹13.60/kg"),
                    ("Peas", "₹35/kg", "-8%", Down, "₹38/kg"),
                    ("Spinach", "₹20/kg", "+15%", Up, "₹17.40/kg"),
                    ("Radish", "₹8/kg", "+6%", Up, "₹7.55/kg"),
                    ("Lettuce", "₹25/kg", "+5%", Up, "₹23.80/kg"),
                    ("Coriander", "₹40/kg", "-10%", Down, "₹44.40/kg"),
                    ("Mint", "₹50/kg", "+8%", Up, "₹46.30/kg"),
                    ("Fenugreek", "₹30/kg", "+12%", Up, "₹26.80/kg"),
                ]),
                market(4, "Okhla Mandi", "Delhi", "22 km", &[
                    ("Apple", "₹120/kg", "+5%", Up, "₹114.30/kg"),
                    ("Orange", "₹60/kg", "-2%", Down, "₹61.20/kg"),
                    ("Banana", "₹40/kg", "+8%", Up, "₹37.00/kg"),
                    ("Grapes", "₹80/kg", "+3%", Up, "₹77.70/kg"),
                    ("Pomegranate", "₹150/kg", "+7%", Up, "₹140.20/kg"),
                    ("Mango", "₹90/kg", "-5%", Down, "₹94.70/kg"),
                    ("Guava", "₹45/kg", "+10%", Up, "₹40.90/kg"),
                    ("Papaya", "₹25/kg", "+4%", Up, "₹24.00/kg"),
                ]),
            ],
        }
    }
}

impl MarketFeed for StaticMarketFeed {
    fn markets(&self) -> &[Market] {
        &self.markets
    }
}

type CropRow<'a> = (&'a str, &'a str, &'a str, Trend, &'a str);

fn market(id: u32, name: &str, location: &str, distance: &str, crops: &[CropRow]) -> Market {
    Market {
        id,
        name: name.to_owned(),
        location: location.to_owned(),
        distance: distance.to_owned(),
        crops: crops
            .iter()
            .map(|&(name, price, change, trend, previous_price)| CropPrice {
                name: name.to_owned(),
                price: price.to_owned(),
                change: change.to_owned(),
                trend,
                previous_price: previous_price.to_owned(),
            })
            .collect(),
    }
}
