//! Basket operation models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timestamped event on a basket during a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub basket_id: Uuid,
    pub cycle_id: Uuid,
    pub size_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub animal_count: Option<i64>,
    pub total_weight_grams: Option<Decimal>,
    pub animals_per_kg: Option<i64>,
    pub average_weight_mg: Option<Decimal>,
    pub dead_count: Option<i64>,
    pub mortality_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Operation kinds recorded against a basket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    PrimaAttivazione,
    Misura,
    Peso,
    Pulizia,
    Vagliatura,
    Trattamento,
    Trasferimento,
    Vendita,
    SelezioneVendita,
    Cessazione,
    ChiusuraCicloVagliatura,
}

impl OperationType {
    pub const ALL: [OperationType; 11] = [
        OperationType::PrimaAttivazione,
        OperationType::Misura,
        OperationType::Peso,
        OperationType::Pulizia,
        OperationType::Vagliatura,
        OperationType::Trattamento,
        OperationType::Trasferimento,
        OperationType::Vendita,
        OperationType::SelezioneVendita,
        OperationType::Cessazione,
        OperationType::ChiusuraCicloVagliatura,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::PrimaAttivazione => "prima-attivazione",
            OperationType::Misura => "misura",
            OperationType::Peso => "peso",
            OperationType::Pulizia => "pulizia",
            OperationType::Vagliatura => "vagliatura",
            OperationType::Trattamento => "trattamento",
            OperationType::Trasferimento => "trasferimento",
            OperationType::Vendita => "vendita",
            OperationType::SelezioneVendita => "selezione-vendita",
            OperationType::Cessazione => "cessazione",
            OperationType::ChiusuraCicloVagliatura => "chiusura-ciclo-vagliatura",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Opens a new cycle on an available basket
    pub fn opens_cycle(&self) -> bool {
        matches!(self, OperationType::PrimaAttivazione)
    }

    /// Closes the active cycle and frees the basket
    pub fn closes_cycle(&self) -> bool {
        matches!(
            self,
            OperationType::Vendita
                | OperationType::SelezioneVendita
                | OperationType::Cessazione
                | OperationType::ChiusuraCicloVagliatura
        )
    }

    /// Counts toward a lot's sold total
    pub fn is_sale(&self) -> bool {
        matches!(self, OperationType::Vendita | OperationType::SelezioneVendita)
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
