use crate::domain::value_objects::enums::{
    ledger_keys::LedgerKey, plan_models::PlanModel, request_types::RequestType,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceRule {
    Flat(f64),
    /// Provider-reported cost times `multiplier`, never below `min_price`.
    Metered { multiplier: f64, min_price: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestPrice {
    pub ledger: LedgerKey,
    pub rule: PriceRule,
}

impl RequestPrice {
    pub fn flat(ledger: LedgerKey, cost: f64) -> Self {
        Self {
            ledger,
            rule: PriceRule::Flat(cost),
        }
    }

    pub fn metered(ledger: LedgerKey, multiplier: f64, min_price: f64) -> Self {
        Self {
            ledger,
            rule: PriceRule::Metered {
                multiplier,
                min_price,
            },
        }
    }

    /// Smallest amount the request can be charged. Used to gate before the call.
    pub fn reserve_cost(&self) -> f64 {
        match self.rule {
            PriceRule::Flat(cost) => cost,
            PriceRule::Metered { min_price, .. } => min_price,
        }
    }

    pub fn cost_for_usage(&self, reported_cost: Option<f64>) -> f64 {
        match self.rule {
            PriceRule::Flat(cost) => cost,
            PriceRule::Metered {
                multiplier,
                min_price,
            } => match reported_cost {
                Some(cost) if cost.is_finite() && cost > 0.0 => (cost * multiplier).max(min_price),
                _ => min_price,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSettings {
    pub text_price: f64,
    pub document_price: f64,
    pub label_price: f64,
    pub equation_price: f64,
    pub chat_min_price: f64,
    pub chat_price_multiplier: f64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            text_price: 0.01,
            document_price: 0.01,
            label_price: 0.01,
            equation_price: 0.02,
            chat_min_price: 0.0001,
            chat_price_multiplier: 1.2,
        }
    }
}

/// Request type to (ledger, price rule), built once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    text: RequestPrice,
    document: RequestPrice,
    label: RequestPrice,
    equation: RequestPrice,
    chat: RequestPrice,
}

impl PricingTable {
    pub fn new(model: PlanModel, settings: &PriceSettings) -> Self {
        let chat = RequestPrice::metered(
            LedgerKey::Credit,
            settings.chat_price_multiplier,
            settings.chat_min_price,
        );

        match model {
            PlanModel::Credit => Self {
                text: RequestPrice::flat(LedgerKey::Credit, settings.text_price),
                document: RequestPrice::flat(LedgerKey::Credit, settings.document_price),
                label: RequestPrice::flat(LedgerKey::Credit, settings.label_price),
                equation: RequestPrice::flat(LedgerKey::Credit, settings.equation_price),
                chat,
            },
            PlanModel::Snaps => Self {
                text: RequestPrice::flat(LedgerKey::TextSnap, 1.0),
                document: RequestPrice::flat(LedgerKey::TextSnap, 1.0),
                label: RequestPrice::flat(LedgerKey::TextSnap, 1.0),
                equation: RequestPrice::flat(LedgerKey::EquationSnap, 1.0),
                chat,
            },
        }
    }

    pub fn price_for(&self, request_type: RequestType) -> RequestPrice {
        match request_type {
            RequestType::Text => self.text,
            RequestType::Document => self.document,
            RequestType::Label => self.label,
            RequestType::Equation => self.equation,
            RequestType::Chat => self.chat,
        }
    }
}
