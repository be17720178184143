//! Conseils affichés avec un diagnostic: produits recommandés et pronostic

use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{name} - {price}")]
pub struct Fertilizer {
    pub name: &'static str,
    pub price: &'static str,
    pub in_stock: bool,
}

impl Fertilizer {
    pub fn availability(&self) -> &'static str {
        if self.in_stock {
            "In Stock"
        } else {
            "Out of Stock"
        }
    }

    /// Libellé de l'action proposée à l'utilisateur
    pub fn action_label(&self) -> &'static str {
        if self.in_stock {
            "Order Now"
        } else {
            "Check Alternatives"
        }
    }
}

pub const RECOMMENDED_FERTILIZERS: [Fertilizer; 3] = [
    Fertilizer {
        name: "Copper Fungicide Spray",
        price: "₹450",
        in_stock: true,
    },
    Fertilizer {
        name: "Blight Control Solution",
        price: "₹320",
        in_stock: true,
    },
    Fertilizer {
        name: "Organic Plant Immunity Booster",
        price: "₹280",
        in_stock: false,
    },
];

/// Pronostic général d'un traitement suivi correctement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreatmentOutlook {
    pub recovery_duration: &'static str,
    pub success_rate: u8,
    pub best_time: &'static str,
}

pub const TREATMENT_OUTLOOK: TreatmentOutlook = TreatmentOutlook {
    recovery_duration: "14-21 days",
    success_rate: 92,
    best_time: "Early morning",
};
