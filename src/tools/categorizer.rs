//! Keyword similarity categorizer
//!
//! Scores each transaction description against a short descriptive phrase
//! list per budget category and picks the best match. Deterministic for
//! identical description text.

use super::Categorizer;
use crate::models::{Category, Transaction};

const CATEGORY_DESCRIPTIONS: [(Category, &[&str]); 6] = [
    (Category::Housing, &["rent", "mortgage", "housing payment", "landlord"]),
    (Category::Food, &[
        "groceries", "grocery", "restaurant", "restaurants", "fast food",
        "coffee shop", "coffee", "dining", "dinner", "lunch", "breakfast",
    ]),
    (Category::Transportation, &[
        "uber", "lyft", "grab", "ride", "public transit", "gas station",
        "flight", "flights", "travel", "toll", "parking",
    ]),
    (Category::Utilities, &[
        "internet", "phone bill", "electricity", "water", "gas", "utility",
    ]),
    (Category::Healthcare, &[
        "doctor", "doctor visit", "pharmacy", "hospital", "insurance", "medical", "clinic",
    ]),
    (Category::Entertainment, &[
        "movies", "movie", "concert", "concerts", "streaming service", "netflix",
        "spotify", "shopping", "clothes", "electronics", "activities",
    ]),
];

pub struct KeywordCategorizer {
    fallback: Category,
}

impl KeywordCategorizer {
    pub fn new(fallback: Category) -> Self {
        Self { fallback }
    }

    /// Score every category; ties keep the earliest category in declaration order.
    fn best_match(&self, description: &str) -> Option<Category> {
        let normalized: String = description
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let padded = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));

        let mut best: Option<(Category, usize)> = None;
        for (category, phrases) in CATEGORY_DESCRIPTIONS.iter() {
            let score = phrases
                .iter()
                .filter(|p| padded.contains(&format!(" {} ", p)))
                .count();
            if score == 0 {
                continue;
            }
            match best {
                Some((_, top)) if top >= score => {}
                _ => best = Some((*category, score)),
            }
        }

        best.map(|(category, _)| category)
    }
}

impl Default for KeywordCategorizer {
    fn default() -> Self {
        Self::new(crate::analyzer::DEFAULT_FALLBACK_CATEGORY)
    }
}

impl Categorizer for KeywordCategorizer {
    fn assign(&self, transaction: &Transaction) -> Category {
        self.best_match(&transaction.description)
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn described(text: &str) -> Transaction {
        Transaction {
            transaction_id: "t".to_string(),
            amount: 10.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: text.to_string(),
            merchant_name: String::new(),
            category: String::new(),
            budget_category: None,
        }
    }

    #[test]
    fn test_assigns_expected_categories() {
        let c = KeywordCategorizer::default();
        assert_eq!(c.assign(&described("Monthly RENT payment")), Category::Housing);
        assert_eq!(c.assign(&described("KFC fast-food dinner")), Category::Food);
        assert_eq!(c.assign(&described("Uber ride home")), Category::Transportation);
        assert_eq!(c.assign(&described("Electricity bill")), Category::Utilities);
        assert_eq!(c.assign(&described("Pharmacy prescription")), Category::Healthcare);
        assert_eq!(c.assign(&described("Netflix streaming service")), Category::Entertainment);
    }

    #[test]
    fn test_tie_prefers_declaration_order() {
        // "grocery" (Food) vs "shopping" (Entertainment)
        let c = KeywordCategorizer::default();
        assert_eq!(c.assign(&described("Grocery shopping")), Category::Food);
    }

    #[test]
    fn test_no_match_uses_fallback() {
        assert_eq!(
            KeywordCategorizer::default().assign(&described("Refund online purchase")),
            Category::Entertainment
        );
        assert_eq!(
            KeywordCategorizer::new(Category::Utilities).assign(&described("???")),
            Category::Utilities
        );
    }

    #[test]
    fn test_word_boundaries() {
        // "gas" must not match inside "Vegas"
        let c = KeywordCategorizer::default();
        assert_eq!(c.assign(&described("Vegas show tickets")), Category::Entertainment);
    }
}
