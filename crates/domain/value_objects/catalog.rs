use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::domain::value_objects::{
    credits::CreditBalances,
    enums::{ledger_keys::LedgerKey, stores::Store},
};

/// What a product grants when purchased.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDefinition {
    pub name: String,
    pub grants: CreditBalances,
}

/// Subscription plans and one-time packages per store, keyed by product id.
#[derive(Debug, Clone, Default)]
pub struct StorePackageCatalog {
    plans: HashMap<Store, HashMap<String, PlanDefinition>>,
    packages: HashMap<Store, HashMap<String, PlanDefinition>>,
}

/// Plan file entry. Accepts the store-console field names as well as an
/// explicit `grants` map.
#[derive(Debug, Deserialize)]
struct PlanFileEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "TextOCRSnap", default)]
    text_ocr_snap: Option<f64>,
    #[serde(rename = "EquationOCRSnap", default)]
    equation_ocr_snap: Option<f64>,
    #[serde(alias = "Credits", default)]
    credits: Option<f64>,
    #[serde(default)]
    grants: Option<BTreeMap<LedgerKey, f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PackageFileEntry {
    Amount(f64),
    Definition(PlanFileEntry),
}

impl PlanFileEntry {
    fn into_definition(self, product_id: &str) -> Result<PlanDefinition> {
        let mut grants = CreditBalances::new();
        if let Some(amount) = self.credits {
            grants.set(LedgerKey::Credit, amount);
        }
        if let Some(amount) = self.text_ocr_snap {
            grants.set(LedgerKey::TextSnap, amount);
        }
        if let Some(amount) = self.equation_ocr_snap {
            grants.set(LedgerKey::EquationSnap, amount);
        }
        for (key, amount) in self.grants.unwrap_or_default() {
            grants.set(key, amount);
        }

        validate_grants(product_id, &grants)?;

        Ok(PlanDefinition {
            name: self.name.unwrap_or_else(|| product_id.to_string()),
            grants,
        })
    }
}

fn validate_grants(product_id: &str, grants: &CreditBalances) -> Result<()> {
    if grants.is_empty() {
        bail!("product {product_id} grants nothing");
    }
    for (key, amount) in grants.iter() {
        if !amount.is_finite() || amount < 0.0 {
            bail!("product {product_id} has an invalid {key} grant: {amount}");
        }
    }
    if grants.is_depleted() {
        bail!("product {product_id} grants nothing");
    }
    Ok(())
}

impl StorePackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the catalog from the raw JSON documents: one plan file per
    /// store (`product_id -> plan`) and a package file
    /// (`store -> product_id -> amount | plan`).
    pub fn from_json(
        app_store_plans: &str,
        play_store_plans: &str,
        packages: &str,
    ) -> Result<Self> {
        let mut catalog = Self::new();

        for (store, raw) in [
            (Store::AppStore, app_store_plans),
            (Store::PlayStore, play_store_plans),
        ] {
            let entries: HashMap<String, PlanFileEntry> = serde_json::from_str(raw)
                .with_context(|| format!("failed to parse {store} plan catalog"))?;
            for (product_id, entry) in entries {
                let definition = entry.into_definition(&product_id)?;
                catalog.insert_plan(store, &product_id, definition);
            }
        }

        let package_entries: HashMap<Store, HashMap<String, PackageFileEntry>> =
            serde_json::from_str(packages).context("failed to parse store package catalog")?;
        for (store, products) in package_entries {
            if store == Store::Unknown {
                bail!("store package catalog contains an unknown store");
            }
            for (product_id, entry) in products {
                let definition = match entry {
                    PackageFileEntry::Amount(amount) => {
                        let grants = CreditBalances::new().with(LedgerKey::Credit, amount);
                        validate_grants(&product_id, &grants)?;
                        PlanDefinition {
                            name: product_id.clone(),
                            grants,
                        }
                    }
                    PackageFileEntry::Definition(entry) => entry.into_definition(&product_id)?,
                };
                catalog.insert_package(store, &product_id, definition);
            }
        }

        Ok(catalog)
    }

    pub fn insert_plan(&mut self, store: Store, product_id: &str, definition: PlanDefinition) {
        self.plans
            .entry(store)
            .or_default()
            .insert(product_id.to_string(), definition);
    }

    pub fn insert_package(&mut self, store: Store, product_id: &str, definition: PlanDefinition) {
        self.packages
            .entry(store)
            .or_default()
            .insert(product_id.to_string(), definition);
    }

    pub fn plan_for(&self, store: Store, product_id: &str) -> Option<&PlanDefinition> {
        self.plans.get(&store)?.get(product_id)
    }

    pub fn package_for(&self, store: Store, product_id: &str) -> Option<&PlanDefinition> {
        self.packages.get(&store)?.get(product_id)
    }

    pub fn plan_count(&self) -> usize {
        self.plans.values().map(HashMap::len).sum()
    }

    pub fn package_count(&self) -> usize {
        self.packages.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_STORE: &str = r#"{
        "lensquery_pro_monthly": {
            "CustomLLMProvider": true,
            "EquationOCRSnap": 100,
            "FullChatExperience": true,
            "TextOCRSnap": 300,
            "name": "Pro Monthly"
        }
    }"#;

    const PLAY_STORE: &str = r#"{
        "lensquery.credit.monthly": { "name": "Credit Monthly", "credits": 5.0 }
    }"#;

    const PACKAGES: &str = r#"{
        "APP_STORE": { "rc_bronze": 1, "rc_gold": { "name": "Gold", "grants": { "credit": 10.0 } } },
        "PLAY_STORE": { "rc_silver": 3 }
    }"#;

    #[test]
    fn parses_store_console_plan_fields() {
        let catalog = StorePackageCatalog::from_json(APP_STORE, PLAY_STORE, PACKAGES).unwrap();

        let plan = catalog
            .plan_for(Store::AppStore, "lensquery_pro_monthly")
            .unwrap();
        assert_eq!(plan.name, "Pro Monthly");
        assert_eq!(plan.grants.get(LedgerKey::TextSnap), 300.0);
        assert_eq!(plan.grants.get(LedgerKey::EquationSnap), 100.0);
        assert_eq!(plan.grants.get(LedgerKey::Credit), 0.0);

        let credit_plan = catalog
            .plan_for(Store::PlayStore, "lensquery.credit.monthly")
            .unwrap();
        assert_eq!(credit_plan.grants.get(LedgerKey::Credit), 5.0);
        assert_eq!(catalog.plan_count(), 2);
    }

    #[test]
    fn plans_are_scoped_to_their_store() {
        let catalog = StorePackageCatalog::from_json(APP_STORE, PLAY_STORE, PACKAGES).unwrap();

        assert!(
            catalog
                .plan_for(Store::PlayStore, "lensquery_pro_monthly")
                .is_none()
        );
        assert!(catalog.plan_for(Store::Stripe, "lensquery_pro_monthly").is_none());
    }

    #[test]
    fn bare_package_amounts_grant_credit() {
        let catalog = StorePackageCatalog::from_json(APP_STORE, PLAY_STORE, PACKAGES).unwrap();

        let bronze = catalog.package_for(Store::AppStore, "rc_bronze").unwrap();
        assert_eq!(bronze.grants.get(LedgerKey::Credit), 1.0);

        let gold = catalog.package_for(Store::AppStore, "rc_gold").unwrap();
        assert_eq!(gold.name, "Gold");
        assert_eq!(gold.grants.get(LedgerKey::Credit), 10.0);

        assert!(catalog.package_for(Store::AppStore, "rc_silver").is_none());
        assert_eq!(catalog.package_count(), 3);
    }

    #[test]
    fn rejects_products_that_grant_nothing() {
        let zero_package = r#"{ "APP_STORE": { "rc_free": 0 } }"#;
        assert!(StorePackageCatalog::from_json("{}", "{}", zero_package).is_err());

        let empty_plan = r#"{ "broken": { "name": "Broken" } }"#;
        assert!(StorePackageCatalog::from_json(empty_plan, "{}", "{}").is_err());

        let negative = r#"{ "neg": { "TextOCRSnap": -5 } }"#;
        assert!(StorePackageCatalog::from_json("{}", negative, "{}").is_err());
    }
}
